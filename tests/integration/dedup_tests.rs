//! Request deduplication integration tests
//!
//! Collapsing, key normalization, shared failures and expiry of completed
//! entries. Time is paused so request durations are exact.

#[cfg(test)]
mod tests {
    use crate::common::{CallCounter, DedupFactory};
    use amas_services::{DedupError, DedupKey, DeduplicationConfig};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    // ==================== Collapsing ====================

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_identical_requests_execute_once() {
        let dedup = DedupFactory::create::<String>();
        let counter = CallCounter::new();
        let request = json!({"model": "gpt-4", "prompt": "hello"});

        let calls = (0..10).map(|_| {
            dedup.deduplicate(
                &request,
                counter.returning(Duration::from_millis(20), "world".to_string()),
            )
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(counter.count(), 1);
        for result in results {
            assert_eq!(result.unwrap(), "world");
        }

        let stats = dedup.stats();
        assert_eq!(stats.total_requests, 10);
        assert_eq!(stats.executions, 1);
        assert_eq!(stats.deduplicated, 9);
        assert!((stats.dedup_rate() - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_field_order_does_not_split_requests() {
        let dedup = DedupFactory::create::<u32>();
        let counter = CallCounter::new();

        let ordered = json!({"a": 1, "b": 2});
        let reordered = json!({"b": 2, "a": 1});
        let (a, b) = tokio::join!(
            dedup.deduplicate(&ordered, counter.returning(Duration::from_millis(10), 7)),
            dedup.deduplicate(&reordered, counter.returning(Duration::from_millis(10), 8)),
        );

        assert_eq!(counter.count(), 1);
        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
    }

    #[test]
    fn test_key_matches_for_reordered_nested_payloads() {
        let original = json!({"outer": {"x": [1, 2], "y": null}, "n": 1.5});
        let reordered = json!({"n": 1.5, "outer": {"y": null, "x": [1, 2]}});
        let shuffled = json!({"n": 1.5, "outer": {"y": null, "x": [2, 1]}});

        let a = DedupKey::from_request(&original).unwrap();
        let b = DedupKey::from_request(&reordered).unwrap();
        let c = DedupKey::from_request(&shuffled).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    /// Two callers in the same tick share one 200ms execution
    #[tokio::test(start_paused = true)]
    async fn test_shared_execution_finishes_once() {
        let dedup = DedupFactory::create::<String>();
        let counter = CallCounter::new();
        let request = json!({"query": "x"});
        let started = Instant::now();

        let first = {
            let dedup = dedup.clone();
            let request = request.clone();
            let slow_fetch = counter.returning(Duration::from_millis(200), "fetched".to_string());
            tokio::spawn(async move {
                let value = dedup.deduplicate(&request, slow_fetch).await;
                (value, started.elapsed())
            })
        };
        let second = {
            let dedup = dedup.clone();
            let slow_fetch = counter.returning(Duration::from_millis(200), "other".to_string());
            tokio::spawn(async move {
                let value = dedup.deduplicate(&request, slow_fetch).await;
                (value, started.elapsed())
            })
        };

        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        assert_eq!(first.0.unwrap(), "fetched");
        assert_eq!(second.0.unwrap(), "fetched");
        // shared, not serialized: both finish near 200ms rather than 400ms
        for elapsed in [first.1, second.1] {
            assert!(elapsed >= Duration::from_millis(200), "{:?}", elapsed);
            assert!(elapsed < Duration::from_millis(250), "{:?}", elapsed);
        }
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_joiner_waits_for_running_request() {
        let dedup = DedupFactory::create::<String>();
        let counter = CallCounter::new();
        let started = Instant::now();

        let owner = {
            let dedup = dedup.clone();
            let fetch = counter.returning(Duration::from_millis(200), "done".to_string());
            tokio::spawn(async move { dedup.deduplicate("payload", fetch).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let joined = dedup
            .deduplicate(
                "payload",
                counter.returning(Duration::from_millis(200), "late".to_string()),
            )
            .await;

        assert_eq!(joined.unwrap(), "done");
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(owner.await.unwrap().unwrap(), "done");
        assert_eq!(counter.count(), 1);
    }

    // ==================== Failures ====================

    #[tokio::test(start_paused = true)]
    async fn test_error_reaches_every_waiter() {
        let dedup = DedupFactory::create::<String>();
        let counter = CallCounter::new();

        let calls = (0..5).map(|_| {
            dedup.deduplicate(
                "failing request",
                counter.failing::<String>(Duration::from_millis(30), "boom"),
            )
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(counter.count(), 1);
        for result in results {
            let err = result.unwrap_err();
            assert!(matches!(err, DedupError::Failed(_)));
            assert_eq!(err.to_string(), "boom");
        }
        assert_eq!(dedup.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_not_remembered() {
        let dedup = DedupFactory::create::<String>();
        let counter = CallCounter::new();

        let first = dedup
            .deduplicate("flaky", counter.failing::<String>(Duration::from_millis(5), "transient"))
            .await;
        assert!(first.is_err());

        let second = dedup
            .deduplicate("flaky", counter.returning(Duration::from_millis(5), "ok".to_string()))
            .await;
        assert_eq!(second.unwrap(), "ok");
        assert_eq!(counter.count(), 2);
    }

    // ==================== Completion ====================

    #[tokio::test(start_paused = true)]
    async fn test_completed_request_runs_again_after_linger() {
        let dedup = DedupFactory::with_config::<u32>(DeduplicationConfig {
            linger_ms: 100,
            ..DeduplicationConfig::default()
        });
        let counter = CallCounter::new();

        assert_eq!(
            dedup
                .deduplicate("same", counter.returning(Duration::from_millis(10), 1))
                .await
                .unwrap(),
            1
        );

        // inside the linger period the finished result is still shared
        assert_eq!(
            dedup
                .deduplicate("same", counter.returning(Duration::from_millis(10), 2))
                .await
                .unwrap(),
            1
        );
        assert_eq!(counter.count(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(dedup.in_flight_count(), 0);

        assert_eq!(
            dedup
                .deduplicate("same", counter.returning(Duration::from_millis(10), 3))
                .await
                .unwrap(),
            3
        );
        assert_eq!(counter.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_linger_removes_entry_on_completion() {
        let dedup = DedupFactory::with_config::<u32>(DeduplicationConfig {
            linger_ms: 0,
            ..DeduplicationConfig::default()
        });
        let counter = CallCounter::new();

        dedup
            .deduplicate("k", counter.returning(Duration::from_millis(10), 1))
            .await
            .unwrap();
        assert_eq!(dedup.in_flight_count(), 0);

        dedup
            .deduplicate("k", counter.returning(Duration::from_millis(10), 2))
            .await
            .unwrap();
        assert_eq!(counter.count(), 2);
    }

    // ==================== Lifecycle ====================

    #[tokio::test(start_paused = true)]
    async fn test_disabled_deduplicator_runs_every_call() {
        let dedup = DedupFactory::with_config::<u32>(DeduplicationConfig::disabled());
        let counter = CallCounter::new();

        let (a, b) = tokio::join!(
            dedup.deduplicate("same", counter.returning(Duration::from_millis(10), 1)),
            dedup.deduplicate("same", counter.returning(Duration::from_millis(10), 2)),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(counter.count(), 2);
        assert!(!dedup.stats().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_waiters() {
        let dedup = DedupFactory::create::<u32>();
        let counter = CallCounter::new();

        let waiter = {
            let dedup = dedup.clone();
            let fetch = counter.returning(Duration::from_secs(10), 1);
            tokio::spawn(async move { dedup.deduplicate("slow", fetch).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        dedup.shutdown();
        assert!(waiter.await.unwrap().unwrap_err().is_cancelled());
        assert!(dedup.is_shutdown());

        let after = dedup
            .deduplicate("slow", counter.returning(Duration::ZERO, 2))
            .await;
        assert!(matches!(after, Err(DedupError::Shutdown)));
    }
}
