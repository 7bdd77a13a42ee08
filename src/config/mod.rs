//! Configuration management for the services
//!
//! This module handles loading, validation, and management of the rate limiter,
//! deduplicator and backing store configuration.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::{debug, info};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Rate limiter settings
    #[serde(default)]
    pub rate_limiter: RateLimiterSettings,
    /// Request deduplication settings
    #[serde(default)]
    pub dedup: DeduplicationConfig,
    /// Distributed backing store
    #[serde(default)]
    pub redis: RedisConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServiceError::Config(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_yaml(&content)?;
        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ServiceError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let mut config = Self::default();
        config.apply_env(|name| env::var(name).ok())?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("AMAS_REDIS_URL") {
            self.redis.url = url;
            self.redis.enabled = true;
        }
        if let Some(enabled) = lookup("AMAS_REDIS_ENABLED") {
            self.redis.enabled = parse_var("AMAS_REDIS_ENABLED", &enabled)?;
        }
        if let Some(rpm) = lookup("AMAS_RATE_LIMIT_RPM") {
            self.rate_limiter.default_limits.requests_per_minute =
                parse_var("AMAS_RATE_LIMIT_RPM", &rpm)?;
        }
        if let Some(rph) = lookup("AMAS_RATE_LIMIT_RPH") {
            self.rate_limiter.default_limits.requests_per_hour =
                parse_var("AMAS_RATE_LIMIT_RPH", &rph)?;
        }
        if let Some(rpd) = lookup("AMAS_RATE_LIMIT_RPD") {
            self.rate_limiter.default_limits.requests_per_day =
                parse_var("AMAS_RATE_LIMIT_RPD", &rpd)?;
        }
        if let Some(prefix) = lookup("AMAS_RATE_LIMIT_KEY_PREFIX") {
            self.rate_limiter.key_prefix = prefix;
        }
        if let Some(enabled) = lookup("AMAS_DEDUP_ENABLED") {
            self.dedup.enabled = parse_var("AMAS_DEDUP_ENABLED", &enabled)?;
        }
        if let Some(ttl) = lookup("AMAS_DEDUP_TTL_SECS") {
            self.dedup.ttl_secs = parse_var("AMAS_DEDUP_TTL_SECS", &ttl)?;
        }
        Ok(())
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");

        self.rate_limiter
            .validate()
            .map_err(|e| ServiceError::Config(format!("Rate limiter config error: {}", e)))?;

        self.dedup
            .validate()
            .map_err(|e| ServiceError::Config(format!("Deduplication config error: {}", e)))?;

        self.redis
            .validate()
            .map_err(|e| ServiceError::Config(format!("Redis config error: {}", e)))?;

        debug!("Configuration validation completed");
        Ok(())
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ServiceError::Config(format!("Invalid {}: {}", name, e)))
}
