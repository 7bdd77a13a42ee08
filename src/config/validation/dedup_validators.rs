//! Deduplication configuration validators

use super::trait_def::Validate;
use crate::config::models::*;

impl Validate for DeduplicationConfig {
    fn validate(&self) -> Result<(), String> {
        if self.ttl_secs == 0 {
            return Err("Deduplication TTL must be greater than 0".to_string());
        }

        if self.max_entries == 0 {
            return Err("Deduplication max_entries must be greater than 0".to_string());
        }

        if self.cleanup_interval_secs == 0 {
            return Err("Deduplication cleanup interval must be greater than 0".to_string());
        }

        if self.linger() >= self.ttl() {
            return Err("Deduplication linger must be shorter than the TTL".to_string());
        }

        Ok(())
    }
}
