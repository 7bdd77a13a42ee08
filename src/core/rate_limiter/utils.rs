//! Maintenance and introspection for the rate limiter

use super::limiter::RateLimiter;
use super::types::RateLimiterStats;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

impl RateLimiter {
    /// Drop window state that has fully expired
    pub async fn cleanup(&self) -> usize {
        let now = self.clock.now_millis();
        match self.store.cleanup(now).await {
            Ok(removed) => {
                if removed > 0 {
                    debug!("Rate limiter cleanup dropped {} idle keys", removed);
                }
                removed
            }
            Err(e) => {
                warn!("Rate limiter cleanup failed: {}", e);
                0
            }
        }
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.settings.cleanup_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                self.cleanup().await;
            }
        })
    }

    /// Snapshot of configured identities and tracked state
    pub async fn stats(&self) -> RateLimiterStats {
        let tracked_keys = match self.store.tracked_keys().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to count tracked rate limit keys: {}", e);
                0
            }
        };

        RateLimiterStats {
            configured_identities: self.configs.len(),
            tracked_keys,
            backend: self.store.backend(),
            distributed_available: self.store.distributed_available(),
        }
    }
}
