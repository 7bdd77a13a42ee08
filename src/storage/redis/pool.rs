//! Redis connection management
//!
//! A single multiplexed [`ConnectionManager`] is shared by every caller; it
//! reconnects on its own after the server drops the connection.

use crate::config::RedisConfig;
use crate::utils::error::{Result, ServiceError};
use crate::utils::logging::sanitize_url;
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

/// Shared Redis connection
#[derive(Clone)]
pub struct RedisPool {
    manager: ConnectionManager,
    url: String,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl RedisPool {
    /// Connect to Redis, giving up after the configured connection timeout
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let url = sanitize_url(&config.url);
        info!("Connecting to Redis at {}", url);

        let client = Client::open(config.url.as_str())?;
        let manager =
            tokio::time::timeout(config.connection_timeout(), ConnectionManager::new(client))
                .await
            .map_err(|_| {
                ServiceError::storage(format!(
                    "Timed out connecting to Redis after {}s",
                    config.connection_timeout
                ))
            })??;

        let pool = Self { manager, url };
        pool.health_check().await?;

        info!("Redis connection established");
        Ok(pool)
    }

    /// Handle to the shared connection
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Sanitized URL of the server
    pub fn url(&self) -> &str {
        &self.url
    }

    /// PING the server
    pub async fn health_check(&self) -> Result<()> {
        debug!("Performing Redis health check");
        let mut conn = self.connection();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(ServiceError::storage(format!(
                "Unexpected PING reply from Redis: {}",
                pong
            )));
        }
        Ok(())
    }
}
