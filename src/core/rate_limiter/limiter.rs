//! Core rate limiter implementation

use super::types::{DEFAULT_ENDPOINT, RateLimitResult};
use crate::config::models::rate_limit::{RateLimitConfig, RateLimiterSettings};
use crate::config::{RedisConfig, Validate};
use crate::storage::{
    FailoverStore, InMemoryWindowStore, StorageBackend, WindowKey, WindowStore, connect_store,
};
use crate::utils::error::{Result, ServiceError};
use crate::utils::time::{Clock, SystemClock};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sliding-window rate limiter over minute, hour and day windows
#[derive(Debug)]
pub struct RateLimiter {
    /// Service settings
    pub(super) settings: RateLimiterSettings,
    /// Explicit per-identity configs
    pub(super) configs: DashMap<String, RateLimitConfig>,
    /// Window state
    pub(super) store: Arc<dyn WindowStore>,
    pub(super) clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter over an existing store.
    ///
    /// A bare Redis store is wrapped in a [`FailoverStore`] so that an
    /// unreachable server degrades to in-memory windows.
    pub fn new(settings: RateLimiterSettings, store: Arc<dyn WindowStore>) -> Result<Self> {
        settings.validate().map_err(|e| {
            ServiceError::validation(format!("Invalid rate limiter settings: {}", e))
        })?;

        let store: Arc<dyn WindowStore> = match store.backend() {
            StorageBackend::Redis => Arc::new(FailoverStore::new(
                store,
                InMemoryWindowStore::new(settings.max_tracked_keys),
                settings.redis_retry_interval(),
            )),
            StorageBackend::Memory | StorageBackend::Failover => store,
        };

        let configs: DashMap<String, RateLimitConfig> = settings
            .identities
            .iter()
            .map(|(identity, config)| (identity.clone(), config.clone()))
            .collect();

        info!(
            "Rate limiter created with {} backend and {} configured identities",
            store.backend(),
            configs.len()
        );

        Ok(Self {
            settings,
            configs,
            store,
            clock: Arc::new(SystemClock),
        })
    }

    /// Create a rate limiter that keeps every window in process memory
    pub fn in_memory(settings: RateLimiterSettings) -> Result<Self> {
        let store = Arc::new(InMemoryWindowStore::new(settings.max_tracked_keys));
        Self::new(settings, store)
    }

    /// Create a rate limiter on Redis when it is enabled and reachable,
    /// falling back to process memory otherwise
    pub async fn connect(settings: RateLimiterSettings, redis: &RedisConfig) -> Result<Self> {
        settings.validate().map_err(|e| {
            ServiceError::validation(format!("Invalid rate limiter settings: {}", e))
        })?;
        let store = connect_store(&settings, redis).await;
        Self::new(settings, store)
    }

    /// Replace the clock used for window arithmetic
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &RateLimiterSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn WindowStore> {
        &self.store
    }

    /// Set the config for an identity, rejecting non-positive limits
    pub fn set_config(&self, identity: impl Into<String>, config: RateLimitConfig) -> Result<()> {
        let identity = identity.into();
        config.validate().map_err(|e| {
            ServiceError::validation(format!("Invalid rate limit config for '{}': {}", identity, e))
        })?;

        debug!(
            "Rate limit config for '{}': {}/min {}/hour {}/day enabled={}",
            identity,
            config.requests_per_minute,
            config.requests_per_hour,
            config.requests_per_day,
            config.enabled
        );
        self.configs.insert(identity, config);
        Ok(())
    }

    /// Config for an identity, or the default limits when none was set
    pub fn get_config(&self, identity: &str) -> RateLimitConfig {
        self.configs
            .get(identity)
            .map(|config| config.value().clone())
            .unwrap_or_else(|| self.settings.default_limits.clone())
    }

    /// Drop an identity's explicit config so the default limits apply again
    pub fn remove_config(&self, identity: &str) -> Option<RateLimitConfig> {
        self.configs.remove(identity).map(|(_, config)| config)
    }

    /// Check and consume quota on the default endpoint
    pub async fn check(&self, identity: &str) -> RateLimitResult {
        self.check_endpoint(identity, DEFAULT_ENDPOINT).await
    }

    /// Check and consume quota on a named endpoint.
    ///
    /// An allowed request is recorded in every window before returning.
    pub async fn check_endpoint(&self, identity: &str, endpoint: &str) -> RateLimitResult {
        self.evaluate(identity, endpoint, true).await
    }

    /// Peek at the current quota without consuming any
    pub async fn status(&self, identity: &str, endpoint: &str) -> RateLimitResult {
        self.evaluate(identity, endpoint, false).await
    }

    /// Clear every window of an identity on every endpoint
    pub async fn reset(&self, identity: &str) -> Result<usize> {
        let cleared = self.store.clear(identity).await?;
        info!("Reset rate limit state for '{}' ({} endpoints)", identity, cleared);
        Ok(cleared)
    }

    async fn evaluate(&self, identity: &str, endpoint: &str, record: bool) -> RateLimitResult {
        let config = self.get_config(identity);
        let now = self.clock.now_millis();

        if !config.enabled {
            return RateLimitResult::unbounded(now);
        }

        let key = WindowKey::new(identity, endpoint);
        match self.store.acquire(&key, &config.windows(), now, record).await {
            Ok(decision) => {
                let result = super::evaluation::summarize(&decision, now, record);
                if !result.allowed {
                    debug!(
                        "Rate limited {} by {} window, retry after {:?}",
                        key,
                        result.limited_by.map(|w| w.as_str()).unwrap_or("unknown"),
                        result.retry_after
                    );
                }
                result
            }
            // storage failures were already absorbed by the failover store
            Err(e) => {
                warn!("Rate limit store failed for {}: {}; allowing request", key, e);
                RateLimitResult::unbounded(now)
            }
        }
    }
}
