//! Rate limiter types and data structures

use crate::core::window::WindowKind;
use crate::storage::StorageBackend;
use crate::utils::time::millis_to_datetime;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// `remaining` reported for identities that bypass every window
pub const UNBOUNDED_REMAINING: u64 = u64::MAX;

/// Endpoint used when the caller does not name one
pub const DEFAULT_ENDPOINT: &str = "default";

/// Rate limit result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Smallest quota left across the evaluated windows
    pub remaining: u64,
    /// Earliest time the binding window frees capacity
    pub reset_time: DateTime<Utc>,
    /// How long to wait before retrying (only set when not allowed)
    #[serde(serialize_with = "serialize_secs")]
    pub retry_after: Option<Duration>,
    /// Window that rejected the request
    pub limited_by: Option<WindowKind>,
}

impl RateLimitResult {
    /// Result for an identity with limiting disabled
    pub fn unbounded(now_millis: u64) -> Self {
        Self {
            allowed: true,
            remaining: UNBOUNDED_REMAINING,
            reset_time: millis_to_datetime(now_millis),
            retry_after: None,
            limited_by: None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.remaining == UNBOUNDED_REMAINING
    }

    /// `retry_after` in fractional seconds
    pub fn retry_after_secs(&self) -> Option<f64> {
        self.retry_after.map(|d| d.as_secs_f64())
    }
}

fn serialize_secs<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    value.map(|d| d.as_secs_f64()).serialize(serializer)
}

/// Snapshot of rate limiter state for monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimiterStats {
    /// Identities with an explicit config
    pub configured_identities: usize,
    /// `(identity, endpoint)` pairs holding window state
    pub tracked_keys: usize,
    pub backend: StorageBackend,
    /// Whether window state is currently shared with other instances
    pub distributed_available: bool,
}
