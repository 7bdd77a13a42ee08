//! Rate Limiting Implementation
//!
//! Per-identity sliding window limits evaluated over minute, hour and day
//! windows. Window state lives in a [`WindowStore`](crate::storage::WindowStore).

mod evaluation;
mod limiter;
mod types;
mod utils;


// Re-export public types
pub use limiter::RateLimiter;
pub use types::{DEFAULT_ENDPOINT, RateLimitResult, RateLimiterStats, UNBOUNDED_REMAINING};
