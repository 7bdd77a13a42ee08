//! Rate limiter integration tests
//!
//! Quota ceilings, window recovery, identity isolation and the tightest
//! window rule, all on a manual clock.

#[cfg(test)]
mod tests {
    use crate::common::assertions::RateLimitAssertions;
    use crate::common::{LimiterFactory, T0};
    use amas_services::utils::time::millis_to_datetime;
    use amas_services::{RateLimitConfig, RateLimiter, ServiceError, WindowKind};
    use std::sync::Arc;
    use std::time::Duration;

    // ==================== Quotas ====================

    /// N checks inside one minute pass, the next one is denied
    #[tokio::test]
    async fn test_quota_ceiling() {
        for n in [1u32, 5, 20] {
            let (limiter, clock) = LimiterFactory::with_limits(n, 1000, 10_000);
            for _ in 0..n {
                assert!(limiter.check("user").await.allowed);
                clock.advance(Duration::from_millis(100));
            }
            limiter.check("user").await.assert_denied_by(WindowKind::Minute);
        }
    }

    /// Three per minute, four checks within a second
    #[tokio::test]
    async fn test_three_per_minute_scenario() {
        let (limiter, clock) = LimiterFactory::create();
        limiter
            .set_config("user1", RateLimitConfig::new(3, 100, 1000))
            .unwrap();

        let mut results = Vec::new();
        for _ in 0..4 {
            results.push(limiter.check("user1").await);
            clock.advance(Duration::from_millis(250));
        }

        results[0].assert_allowed_with(2);
        results[1].assert_allowed_with(1);
        results[2].assert_allowed_with(0);
        results[3].assert_denied_by(WindowKind::Minute);

        // the 4th ran 750ms after the first admitted request
        results[3].assert_retry_after_near(Duration::from_millis(59_250), Duration::from_millis(1));
        assert_eq!(results[3].reset_time, millis_to_datetime(T0 + 60_000));
    }

    /// Disabled identities are never limited
    #[tokio::test]
    async fn test_disabled_identity_scenario() {
        let (limiter, _) = LimiterFactory::with_limits(1, 1, 1);
        limiter.set_config("bot", RateLimitConfig::disabled()).unwrap();

        for _ in 0..1_000 {
            limiter.check("bot").await.assert_unbounded();
        }
    }

    // ==================== Recovery ====================

    #[tokio::test]
    async fn test_window_recovery() {
        let (limiter, clock) = LimiterFactory::with_limits(2, 1000, 10_000);

        limiter.check("user").await;
        clock.advance(Duration::from_secs(20));
        limiter.check("user").await;

        let denied = limiter.check("user").await;
        denied.assert_denied_by(WindowKind::Minute);
        denied.assert_retry_after_near(Duration::from_secs(40), Duration::ZERO);

        // one millisecond short of the oldest entry expiring
        clock.advance(Duration::from_millis(39_999));
        assert!(!limiter.check("user").await.allowed);

        clock.advance(Duration::from_millis(1));
        limiter.check("user").await.assert_allowed_with(0);
    }

    #[tokio::test]
    async fn test_hour_window_outlives_minute_window() {
        let (limiter, clock) = LimiterFactory::with_limits(10, 3, 10_000);

        for _ in 0..3 {
            assert!(limiter.check("user").await.allowed);
        }
        clock.advance(Duration::from_secs(120));

        let denied = limiter.check("user").await;
        denied.assert_denied_by(WindowKind::Hour);
        denied.assert_retry_after_near(Duration::from_secs(3_480), Duration::ZERO);

        clock.advance(Duration::from_secs(3_480));
        assert!(limiter.check("user").await.allowed);
    }

    // ==================== Isolation ====================

    #[tokio::test]
    async fn test_independent_identities() {
        let (limiter, _) = LimiterFactory::with_limits(3, 1000, 10_000);

        for _ in 0..3 {
            limiter.check("a").await;
        }
        assert!(!limiter.check("a").await.allowed);

        for expected in [2, 1, 0] {
            limiter.check("b").await.assert_allowed_with(expected);
        }
    }

    #[tokio::test]
    async fn test_endpoints_share_config_but_not_windows() {
        let (limiter, _) = LimiterFactory::with_limits(5, 1000, 10_000);
        limiter.set_config("user", RateLimitConfig::new(1, 10, 100)).unwrap();

        assert!(limiter.check_endpoint("user", "/v1/chat").await.allowed);
        assert!(!limiter.check_endpoint("user", "/v1/chat").await.allowed);
        assert!(limiter.check_endpoint("user", "/v1/embeddings").await.allowed);
    }

    #[tokio::test]
    async fn test_empty_identity_is_an_ordinary_key() {
        let (limiter, _) = LimiterFactory::with_limits(1, 1000, 10_000);
        assert!(limiter.check("").await.allowed);
        assert!(!limiter.check("").await.allowed);
        assert!(limiter.check("someone").await.allowed);
    }

    // ==================== Window ordering ====================

    #[tokio::test]
    async fn test_tightest_window_wins() {
        let (limiter, _) = LimiterFactory::with_limits(2, 1, 1000);

        assert!(limiter.check("user").await.allowed);
        limiter.check("user").await.assert_denied_by(WindowKind::Hour);
    }

    #[tokio::test]
    async fn test_denied_check_consumes_nothing() {
        let (limiter, clock) = LimiterFactory::with_limits(1, 1000, 10_000);

        limiter.check("user").await;
        for _ in 0..50 {
            assert!(!limiter.check("user").await.allowed);
        }

        clock.advance(Duration::from_secs(60));
        let result = limiter.check("user").await;
        result.assert_allowed_with(0);

        let status = limiter.status("user", "default").await;
        assert!(!status.allowed);
    }

    // ==================== Administration ====================

    #[tokio::test]
    async fn test_reset_restores_quota() {
        let (limiter, _) = LimiterFactory::with_limits(1, 1000, 10_000);
        limiter.check("user").await;
        assert!(!limiter.check("user").await.allowed);

        limiter.reset("user").await.unwrap();
        limiter.check("user").await.assert_allowed_with(0);
    }

    #[tokio::test]
    async fn test_misconfiguration_rejected() {
        let (limiter, _) = LimiterFactory::create();
        for config in [
            RateLimitConfig::new(0, 10, 100),
            RateLimitConfig::new(10, 0, 100),
            RateLimitConfig::new(10, 10, 0),
        ] {
            let err = limiter.set_config("user", config).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "got {:?}", err);
        }
    }

    #[tokio::test]
    async fn test_result_serializes_retry_after_as_seconds() {
        let (limiter, _) = LimiterFactory::with_limits(1, 1000, 10_000);
        limiter.check("user").await;

        let json = serde_json::to_value(limiter.check("user").await).unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["retry_after"], 60.0);
        assert_eq!(json["limited_by"], "minute");
    }

    // ==================== Concurrency ====================

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_parallel_checks_never_exceed_limit() {
        let (limiter, _) = LimiterFactory::with_limits(25, 1000, 10_000);
        let limiter: Arc<RateLimiter> = Arc::new(limiter);

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.check("hot").await.allowed })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_cleanup_task() {
        let (limiter, clock) = LimiterFactory::create();
        let limiter = Arc::new(limiter);
        limiter.check("user").await;
        assert_eq!(limiter.stats().await.tracked_keys, 1);

        let task = Arc::clone(&limiter).start_cleanup_task();
        clock.advance(Duration::from_secs(86_400));
        tokio::time::sleep(limiter.settings().cleanup_interval() + Duration::from_secs(1)).await;

        assert_eq!(limiter.stats().await.tracked_keys, 0);
        task.abort();
    }
}
