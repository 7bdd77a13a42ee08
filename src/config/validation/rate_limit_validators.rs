//! Rate limit configuration validators

use super::trait_def::Validate;
use crate::config::models::*;
use tracing::debug;

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), String> {
        if self.requests_per_minute == 0 {
            return Err("requests_per_minute must be greater than 0".to_string());
        }

        if self.requests_per_hour == 0 {
            return Err("requests_per_hour must be greater than 0".to_string());
        }

        if self.requests_per_day == 0 {
            return Err("requests_per_day must be greater than 0".to_string());
        }

        // A looser-granularity ceiling below a tighter one is legal, just unusual
        if self.requests_per_hour < self.requests_per_minute
            || self.requests_per_day < self.requests_per_hour
        {
            debug!(
                rpm = self.requests_per_minute,
                rph = self.requests_per_hour,
                rpd = self.requests_per_day,
                "Rate limit windows are not monotonic; the smallest ceiling will bind"
            );
        }

        Ok(())
    }
}

impl Validate for RateLimiterSettings {
    fn validate(&self) -> Result<(), String> {
        self.default_limits
            .validate()
            .map_err(|e| format!("default_limits: {}", e))?;

        if self.key_prefix.is_empty() {
            return Err("key_prefix cannot be empty".to_string());
        }

        if self.max_tracked_keys == 0 {
            return Err("max_tracked_keys must be greater than 0".to_string());
        }

        if self.cleanup_interval_secs == 0 {
            return Err("cleanup_interval_secs must be greater than 0".to_string());
        }

        for (identity, config) in &self.identities {
            if identity.is_empty() {
                return Err("identity names cannot be empty".to_string());
            }
            config
                .validate()
                .map_err(|e| format!("identity '{}': {}", identity, e))?;
        }

        Ok(())
    }
}
