//! Window storage layer
//!
//! Rate-limit window state lives behind the [`WindowStore`] capability. The
//! implementation is picked once, when the store is connected:
//!
//! - `memory` - process-local windows, guarded per key
//! - `redis` - sorted-set windows shared between instances (feature `redis`)
//! - `failover` - Redis primary that degrades to memory while unreachable

pub mod backend;
pub mod failover;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use backend::{StorageBackend, WindowKey, WindowStore};
pub use failover::FailoverStore;
pub use memory::InMemoryWindowStore;
#[cfg(feature = "redis")]
pub use redis::{RedisPool, RedisWindowStore};

use crate::config::{RateLimiterSettings, RedisConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// Build the window store described by the configuration.
///
/// A Redis store that cannot be reached at startup is not an error: the
/// limiter runs on process-local windows instead.
pub async fn connect_store(
    settings: &RateLimiterSettings,
    redis: &RedisConfig,
) -> Arc<dyn WindowStore> {
    let memory = InMemoryWindowStore::new(settings.max_tracked_keys);

    if !redis.enabled {
        info!("Redis disabled, using in-memory rate limit windows");
        return Arc::new(memory);
    }

    #[cfg(feature = "redis")]
    {
        match RedisWindowStore::connect(redis, &settings.key_prefix).await {
            Ok(store) => {
                info!("Rate limit windows backed by Redis with in-memory failover");
                return Arc::new(FailoverStore::new(
                    Arc::new(store),
                    memory,
                    settings.redis_retry_interval(),
                ));
            }
            Err(e) => {
                warn!(
                    "Redis unavailable at {} ({}), using in-memory rate limit windows",
                    crate::utils::logging::sanitize_url(&redis.url),
                    e
                );
            }
        }
    }

    #[cfg(not(feature = "redis"))]
    warn!("Redis requested but the `redis` feature is not compiled in, using in-memory windows");

    Arc::new(memory)
}
