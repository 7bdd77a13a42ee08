//! Core functionality for the services
//!
//! This module contains the sliding window primitive, the rate limiter, the
//! request deduplicator and the guard that composes them.

pub mod dedup;
pub mod guard;
pub mod rate_limiter;
pub mod window;

pub use dedup::{DedupError, DedupKey, DedupStats, RequestDeduplicator};
pub use guard::{GuardError, RateLimitExceeded, RequestGuard};
pub use rate_limiter::{RateLimitResult, RateLimiter, RateLimiterStats};
