//! Distributed store with an in-memory fallback
//!
//! Availability wins over global accuracy: while the primary is failing,
//! windows are tracked per process and the primary is probed again once the
//! retry interval has passed.

use super::backend::{StorageBackend, WindowKey, WindowStore};
use super::memory::InMemoryWindowStore;
use crate::core::window::{WindowDecision, WindowSpec};
use crate::utils::error::{Result, ServiceError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct FailoverStore {
    primary: Arc<dyn WindowStore>,
    fallback: InMemoryWindowStore,
    primary_healthy: AtomicBool,
    last_failure: Mutex<Option<Instant>>,
    retry_interval: Duration,
}

impl FailoverStore {
    pub fn new(
        primary: Arc<dyn WindowStore>,
        fallback: InMemoryWindowStore,
        retry_interval: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            primary_healthy: AtomicBool::new(true),
            last_failure: Mutex::new(None),
            retry_interval,
        }
    }

    pub fn primary_healthy(&self) -> bool {
        self.primary_healthy.load(Ordering::Acquire)
    }

    fn should_try_primary(&self) -> bool {
        if self.primary_healthy() {
            return true;
        }
        match *self.last_failure.lock() {
            Some(at) => at.elapsed() >= self.retry_interval,
            None => true,
        }
    }

    /// Record a primary failure. Errors that do not come from the backing
    /// store are handed back to the caller instead of triggering failover.
    fn absorb(&self, operation: &str, error: ServiceError) -> Result<()> {
        if !error.is_storage() {
            return Err(error);
        }
        self.mark_failed(operation, &error);
        Ok(())
    }

    fn mark_failed(&self, operation: &str, error: &ServiceError) {
        *self.last_failure.lock() = Some(Instant::now());
        if self.primary_healthy.swap(false, Ordering::AcqRel) {
            warn!(
                "{} backend failed during {}: {}; falling back to in-memory windows",
                self.primary.backend(),
                operation,
                error
            );
        } else {
            debug!("{} backend still unavailable: {}", self.primary.backend(), error);
        }
    }

    fn mark_recovered(&self) {
        if !self.primary_healthy.swap(true, Ordering::AcqRel) {
            info!("{} backend reachable again", self.primary.backend());
        }
    }
}

#[async_trait]
impl WindowStore for FailoverStore {
    async fn acquire(
        &self,
        key: &WindowKey,
        windows: &[WindowSpec],
        now_millis: u64,
        record: bool,
    ) -> Result<WindowDecision> {
        if self.should_try_primary() {
            match self.primary.acquire(key, windows, now_millis, record).await {
                Ok(decision) => {
                    self.mark_recovered();
                    return Ok(decision);
                }
                Err(e) => self.absorb("acquire", e)?,
            }
        }
        self.fallback.acquire(key, windows, now_millis, record).await
    }

    async fn clear(&self, identity: &str) -> Result<usize> {
        let local = self.fallback.clear(identity).await?;
        if !self.should_try_primary() {
            return Ok(local);
        }
        match self.primary.clear(identity).await {
            Ok(remote) => {
                self.mark_recovered();
                Ok(remote.max(local))
            }
            Err(e) => {
                self.absorb("clear", e)?;
                Ok(local)
            }
        }
    }

    async fn tracked_keys(&self) -> Result<usize> {
        if self.should_try_primary() {
            match self.primary.tracked_keys().await {
                Ok(count) => {
                    self.mark_recovered();
                    return Ok(count);
                }
                Err(e) => self.absorb("tracked_keys", e)?,
            }
        }
        self.fallback.tracked_keys().await
    }

    async fn ping(&self) -> Result<()> {
        match self.primary.ping().await {
            Ok(()) => {
                self.mark_recovered();
                Ok(())
            }
            Err(e) => {
                if e.is_storage() {
                    self.mark_failed("ping", &e);
                }
                Err(e)
            }
        }
    }

    async fn cleanup(&self, now_millis: u64) -> Result<usize> {
        let mut removed = self.fallback.cleanup(now_millis).await?;
        if self.primary_healthy() {
            match self.primary.cleanup(now_millis).await {
                Ok(count) => removed += count,
                Err(e) => self.absorb("cleanup", e)?,
            }
        }
        Ok(removed)
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Failover
    }

    fn distributed_available(&self) -> bool {
        self.primary_healthy()
    }
}
