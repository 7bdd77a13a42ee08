//! Guarded request integration tests
//!
//! Deduplication in front of the rate limiter.

#[cfg(test)]
mod tests {
    use crate::common::{CallCounter, DedupFactory, LimiterFactory};
    use amas_services::{GuardError, RequestGuard, WindowKind};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn guard(rpm: u32) -> (RequestGuard<String>, amas_services::ManualClock) {
        let (limiter, clock) = LimiterFactory::with_limits(rpm, 1000, 10_000);
        (RequestGuard::new(Arc::new(limiter), DedupFactory::create()), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_collapsed_burst_costs_one_request() {
        let (guard, _) = guard(2);
        let counter = CallCounter::new();
        let request = json!({"messages": [{"role": "user", "content": "hi"}]});

        let calls = (0..20).map(|_| {
            guard.execute(
                "tenant",
                "/v1/chat",
                &request,
                counter.returning(Duration::from_millis(40), "reply".to_string()),
            )
        });
        for result in futures::future::join_all(calls).await {
            assert_eq!(result.unwrap(), "reply");
        }

        assert_eq!(counter.count(), 1);
        let status = guard.limiter().status("tenant", "/v1/chat").await;
        assert_eq!(status.remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_request_never_runs() {
        let (guard, clock) = guard(1);
        let counter = CallCounter::new();

        guard
            .execute("tenant", "chat", "a", counter.returning(Duration::ZERO, "a".to_string()))
            .await
            .unwrap();

        let err = guard
            .execute("tenant", "chat", "b", counter.returning(Duration::ZERO, "b".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::RateLimited(_)));
        let result = err.rate_limit().unwrap();
        assert_eq!(result.limited_by, Some(WindowKind::Minute));
        assert_eq!(counter.count(), 1);

        clock.advance(Duration::from_secs(60));
        assert_eq!(
            guard
                .execute("tenant", "chat", "b", counter.returning(Duration::ZERO, "b".to_string()))
                .await
                .unwrap(),
            "b"
        );
    }

    #[tokio::test]
    async fn test_failures_are_request_errors() {
        let (guard, _) = guard(5);
        let counter = CallCounter::new();

        let err = guard
            .execute(
                "tenant",
                "chat",
                "q",
                counter.failing::<String>(Duration::ZERO, "503 from upstream"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GuardError::Request(_)));
        assert_eq!(err.to_string(), "503 from upstream");
    }
}
