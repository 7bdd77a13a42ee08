//! Storage configuration validators

use super::trait_def::Validate;
use crate::config::models::*;

impl Validate for RedisConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        if self.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }

        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err("Redis URL must start with redis:// or rediss://".to_string());
        }

        if url::Url::parse(&self.url).is_err() {
            return Err(format!(
                "Redis URL is malformed: {}",
                crate::utils::logging::sanitize_url(&self.url)
            ));
        }

        if self.connection_timeout == 0 {
            return Err("Redis connection timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
