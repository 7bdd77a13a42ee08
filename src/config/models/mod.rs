//! Configuration data models
//!
//! This module defines all configuration structures used by the services.

#![allow(missing_docs)]

pub mod dedup;
pub mod rate_limit;
pub mod storage;

// Re-export all configuration types
pub use dedup::*;
pub use rate_limit::*;
pub use storage::*;

/// Default requests per minute for an identity without explicit config
pub fn default_requests_per_minute() -> u32 {
    60
}

/// Default requests per hour
pub fn default_requests_per_hour() -> u32 {
    1000
}

/// Default requests per day
pub fn default_requests_per_day() -> u32 {
    10_000
}

/// Default burst allowance (informational)
pub fn default_burst_size() -> u32 {
    10
}

/// Default interval between background sweeps, in seconds
pub fn default_cleanup_interval() -> u64 {
    60
}

pub(crate) fn default_true() -> bool {
    true
}
