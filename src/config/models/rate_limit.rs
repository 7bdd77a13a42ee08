//! Rate limiting configuration

use super::*;
use crate::core::window::{WindowKind, WindowSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-identity quota configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed in any trailing minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Requests allowed in any trailing hour
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
    /// Requests allowed in any trailing day
    #[serde(default = "default_requests_per_day")]
    pub requests_per_day: u32,
    /// Reserved burst allowance; carried but not enforced separately from the windows
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
    /// When false the identity bypasses every window
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            requests_per_hour: default_requests_per_hour(),
            requests_per_day: default_requests_per_day(),
            burst_size: default_burst_size(),
            enabled: true,
        }
    }
}

impl RateLimitConfig {
    /// Create an enabled config with the given window ceilings
    pub fn new(requests_per_minute: u32, requests_per_hour: u32, requests_per_day: u32) -> Self {
        Self {
            requests_per_minute,
            requests_per_hour,
            requests_per_day,
            ..Self::default()
        }
    }

    /// A config that lets every request through
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_burst_size(mut self, burst_size: u32) -> Self {
        self.burst_size = burst_size;
        self
    }

    /// Window ceilings, tightest window first
    pub fn windows(&self) -> [WindowSpec; 3] {
        [
            WindowSpec::new(WindowKind::Minute, self.requests_per_minute as u64),
            WindowSpec::new(WindowKind::Hour, self.requests_per_hour as u64),
            WindowSpec::new(WindowKind::Day, self.requests_per_day as u64),
        ]
    }
}

/// Rate limiter service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterSettings {
    /// Config applied to identities without an explicit entry
    #[serde(default)]
    pub default_limits: RateLimitConfig,
    /// Prefix for every key written to the distributed store
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Upper bound on `(identity, endpoint)` pairs tracked in memory
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
    /// Seconds between sweeps of idle in-memory windows
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// Seconds to stay on the in-memory fallback before probing Redis again
    #[serde(default = "default_redis_retry_interval")]
    pub redis_retry_interval_secs: u64,
    /// Per-identity configs loaded at construction
    #[serde(default)]
    pub identities: HashMap<String, RateLimitConfig>,
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self {
            default_limits: RateLimitConfig::default(),
            key_prefix: default_key_prefix(),
            max_tracked_keys: default_max_tracked_keys(),
            cleanup_interval_secs: default_cleanup_interval(),
            redis_retry_interval_secs: default_redis_retry_interval(),
            identities: HashMap::new(),
        }
    }
}

impl RateLimiterSettings {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn redis_retry_interval(&self) -> Duration {
        Duration::from_secs(self.redis_retry_interval_secs)
    }
}

fn default_key_prefix() -> String {
    "amas:ratelimit".to_string()
}

fn default_max_tracked_keys() -> usize {
    100_000
}

fn default_redis_retry_interval() -> u64 {
    30
}
