//! Custom test assertions
//!
//! Domain-specific assertions for rate limit results.

use amas_services::{RateLimitResult, UNBOUNDED_REMAINING, WindowKind};
use std::time::Duration;

/// Assertions for RateLimitResult
pub trait RateLimitAssertions {
    /// Assert the request was allowed with `remaining` quota left
    fn assert_allowed_with(&self, remaining: u64);

    /// Assert the request was denied by `window`
    fn assert_denied_by(&self, window: WindowKind);

    /// Assert the retry hint is within `tolerance` of `expected`
    fn assert_retry_after_near(&self, expected: Duration, tolerance: Duration);

    /// Assert the identity bypassed limiting
    fn assert_unbounded(&self);
}

impl RateLimitAssertions for RateLimitResult {
    fn assert_allowed_with(&self, remaining: u64) {
        assert!(self.allowed, "Expected request to be allowed, got {:?}", self);
        assert_eq!(self.remaining, remaining, "Unexpected remaining quota");
        assert!(self.retry_after.is_none(), "Allowed results carry no retry hint");
    }

    fn assert_denied_by(&self, window: WindowKind) {
        assert!(!self.allowed, "Expected request to be denied, got {:?}", self);
        assert_eq!(self.remaining, 0);
        assert_eq!(self.limited_by, Some(window));
    }

    fn assert_retry_after_near(&self, expected: Duration, tolerance: Duration) {
        let actual = self
            .retry_after
            .unwrap_or_else(|| panic!("Expected a retry hint, got {:?}", self));
        let diff = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            diff <= tolerance,
            "retry_after {:?} not within {:?} of {:?}",
            actual,
            tolerance,
            expected
        );
    }

    fn assert_unbounded(&self) {
        assert!(self.allowed);
        assert_eq!(self.remaining, UNBOUNDED_REMAINING);
    }
}
