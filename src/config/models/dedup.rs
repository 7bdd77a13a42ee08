//! Request deduplication configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deduplication configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    /// When false every call executes independently
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds after which an unfinished in-flight entry is treated as abandoned
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Milliseconds a completed entry stays joinable
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
    /// Maximum tracked in-flight entries
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Seconds between background eviction sweeps
    #[serde(default = "default_dedup_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            linger_ms: default_linger_ms(),
            max_entries: default_max_entries(),
            cleanup_interval_secs: default_dedup_cleanup_interval(),
        }
    }
}

impl DeduplicationConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

fn default_ttl_secs() -> u64 {
    30
}

fn default_linger_ms() -> u64 {
    100
}

fn default_max_entries() -> usize {
    1000
}

fn default_dedup_cleanup_interval() -> u64 {
    10
}
