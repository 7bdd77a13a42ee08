//! In-flight request deduplication
//!
//! Callers presenting the same [`DedupKey`] while a request is running share
//! that request's outcome instead of starting their own. The registry lookup
//! and insert happen under one lock, and the request function runs only once
//! the first caller polls the shared future, never under the lock.

use super::key::DedupKey;
use super::types::{AtomicDedupStats, DedupError, DedupStats};
use crate::config::{DeduplicationConfig, Validate};
use crate::utils::error::{Result, ServiceError};
use futures::future::{AbortHandle, Aborted, BoxFuture, FutureExt, Shared, abortable};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type SharedOutcome<T> = Shared<BoxFuture<'static, std::result::Result<T, DedupError>>>;

/// A registered execution
struct InFlight<T> {
    /// Distinguishes this execution from a later one under the same key
    id: u64,
    outcome: SharedOutcome<T>,
    abort: AbortHandle,
    started: Instant,
}

struct Registry<T> {
    config: DeduplicationConfig,
    entries: Mutex<HashMap<DedupKey, InFlight<T>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    stats: AtomicDedupStats,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Registry<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn is_stale(&self, entry: &InFlight<T>, now: Instant) -> bool {
        now.duration_since(entry.started) >= self.config.ttl()
    }

    fn remove_if_current(&self, key: &DedupKey, id: u64) {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|entry| entry.id == id) {
            entries.remove(key);
        }
    }

    fn evict_expired(&self, now: Instant) -> usize {
        let ttl = self.config.ttl();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.started) < ttl);
        let removed = before - entries.len();
        AtomicDedupStats::bump_by(&self.stats.evictions, removed as u64);
        removed
    }

    /// Called by the shared future once the request settles. Successful
    /// outcomes stay joinable for the linger period; failures and
    /// cancellations are dropped at once so the next caller retries.
    fn finish(registry: &Weak<Self>, key: DedupKey, id: u64, succeeded: bool) {
        let Some(registry) = registry.upgrade() else {
            return;
        };

        let linger = registry.config.linger();
        if succeeded && !linger.is_zero() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let weak = Arc::downgrade(&registry);
                runtime.spawn(async move {
                    tokio::time::sleep(linger).await;
                    if let Some(registry) = weak.upgrade() {
                        registry.remove_if_current(&key, id);
                    }
                });
                return;
            }
        }
        registry.remove_if_current(&key, id);
    }
}

/// Collapses concurrent identical requests into one execution
pub struct RequestDeduplicator<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for RequestDeduplicator<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> fmt::Debug for RequestDeduplicator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDeduplicator")
            .field("config", &self.registry.config)
            .field("in_flight", &self.registry.entries.lock().len())
            .field("closed", &self.registry.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new deduplicator
    pub fn new(config: DeduplicationConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ServiceError::validation(format!("Invalid deduplication config: {}", e)))?;

        info!(
            "Request deduplicator created (enabled={}, ttl={}s, max_entries={})",
            config.enabled, config.ttl_secs, config.max_entries
        );

        Ok(Self {
            registry: Arc::new(Registry {
                config,
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                stats: AtomicDedupStats::default(),
                cleanup_task: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &DeduplicationConfig {
        &self.registry.config
    }

    /// Run `request_fn` unless an identical request is already in flight, in
    /// which case wait for that one's outcome.
    ///
    /// If the payload cannot be serialized the request runs on its own.
    pub async fn deduplicate<R, F, Fut, E>(
        &self,
        request: &R,
        request_fn: F,
    ) -> std::result::Result<T, DedupError>
    where
        R: Serialize + Sync + ?Sized,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        match DedupKey::from_request(request) {
            Ok(key) => self.deduplicate_with_key(key, request_fn).await,
            Err(e) => {
                warn!("Failed to derive deduplication key, executing without deduplication: {}", e);
                self.execute_alone(request_fn).await
            }
        }
    }

    /// Same as [`deduplicate`](Self::deduplicate) for callers that already hold a key
    pub async fn deduplicate_with_key<F, Fut, E>(
        &self,
        key: DedupKey,
        request_fn: F,
    ) -> std::result::Result<T, DedupError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        if !self.registry.config.enabled {
            return self.execute_alone(request_fn).await;
        }

        let outcome = self.join_or_start(key, request_fn)?;
        outcome.await
    }

    /// Run a request without registering it
    pub(crate) async fn execute_alone<F, Fut, E>(
        &self,
        request_fn: F,
    ) -> std::result::Result<T, DedupError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        if self.registry.closed.load(Ordering::Acquire) {
            return Err(DedupError::Shutdown);
        }
        AtomicDedupStats::bump(&self.registry.stats.total_requests);
        AtomicDedupStats::bump(&self.registry.stats.executions);
        request_fn().await.map_err(DedupError::failed)
    }

    fn join_or_start<F, Fut, E>(
        &self,
        key: DedupKey,
        request_fn: F,
    ) -> std::result::Result<SharedOutcome<T>, DedupError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let registry = &self.registry;
        let now = Instant::now();
        let mut entries = registry.entries.lock();

        if registry.closed.load(Ordering::Acquire) {
            return Err(DedupError::Shutdown);
        }
        AtomicDedupStats::bump(&registry.stats.total_requests);

        if let Some(entry) = entries.get(&key) {
            if !registry.is_stale(entry, now) {
                AtomicDedupStats::bump(&registry.stats.deduplicated);
                debug!("Joining in-flight request {}", key);
                return Ok(entry.outcome.clone());
            }
            debug!("In-flight request {} exceeded its TTL, starting over", key);
            entries.remove(&key);
            AtomicDedupStats::bump(&registry.stats.evictions);
        }

        if entries.len() >= registry.config.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.started)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                AtomicDedupStats::bump(&registry.stats.evictions);
                debug!("Deduplication registry full, evicted {}", oldest);
            }
        }

        let id = registry.next_id.fetch_add(1, Ordering::Relaxed);
        let (task, abort) =
            abortable(async move { request_fn().await.map_err(DedupError::failed) });

        let weak = Arc::downgrade(registry);
        let settled_key = key.clone();
        let outcome: SharedOutcome<T> = async move {
            let outcome = match task.await {
                Ok(result) => result,
                Err(Aborted) => Err(DedupError::Cancelled),
            };
            Registry::finish(&weak, settled_key, id, outcome.is_ok());
            outcome
        }
        .boxed()
        .shared();

        entries.insert(
            key,
            InFlight {
                id,
                outcome: outcome.clone(),
                abort,
                started: now,
            },
        );
        AtomicDedupStats::bump(&registry.stats.executions);

        Ok(outcome)
    }

    /// Whether a live entry exists for `key`
    pub fn is_in_flight(&self, key: &DedupKey) -> bool {
        let now = Instant::now();
        self.registry
            .entries
            .lock()
            .get(key)
            .is_some_and(|entry| !self.registry.is_stale(entry, now))
    }

    /// Drop entries older than the TTL. Their waiters keep waiting; only new
    /// callers stop joining them.
    pub fn cleanup(&self) -> usize {
        let removed = self.registry.evict_expired(Instant::now());
        if removed > 0 {
            debug!("Evicted {} stale in-flight requests", removed);
        }
        removed
    }

    /// Periodically evict stale entries. Must be called inside a Tokio runtime;
    /// calling it again while the task runs has no effect.
    pub fn start_cleanup_task(&self) {
        let mut slot = self.registry.cleanup_task.lock();
        if slot.is_some() || self.registry.closed.load(Ordering::Acquire) {
            return;
        }

        let weak = Arc::downgrade(&self.registry);
        let period = self.registry.config.cleanup_interval();
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(registry) = weak.upgrade() else {
                    break;
                };
                let removed = registry.evict_expired(Instant::now());
                if removed > 0 {
                    debug!("Evicted {} stale in-flight requests", removed);
                }
            }
        }));
    }

    /// Stop the cleanup task and cancel every pending execution. Waiters
    /// receive [`DedupError::Cancelled`]; later calls get [`DedupError::Shutdown`].
    pub fn shutdown(&self) {
        let pending: Vec<InFlight<T>> = {
            let mut entries = self.registry.entries.lock();
            self.registry.closed.store(true, Ordering::Release);
            entries.drain().map(|(_, entry)| entry).collect()
        };

        if let Some(task) = self.registry.cleanup_task.lock().take() {
            task.abort();
        }

        let mut cancelled = 0;
        for entry in &pending {
            if entry.outcome.peek().is_none() {
                entry.abort.abort();
                cancelled += 1;
            }
        }
        info!("Request deduplicator shut down, cancelled {} pending requests", cancelled);
    }

    pub fn is_shutdown(&self) -> bool {
        self.registry.closed.load(Ordering::Acquire)
    }

    pub fn in_flight_count(&self) -> usize {
        self.registry.entries.lock().len()
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> DedupStats {
        let stats = &self.registry.stats;
        DedupStats {
            enabled: self.registry.config.enabled,
            in_flight: self.in_flight_count(),
            total_requests: stats.total_requests.load(Ordering::Relaxed),
            executions: stats.executions.load(Ordering::Relaxed),
            deduplicated: stats.deduplicated.load(Ordering::Relaxed),
            evictions: stats.evictions.load(Ordering::Relaxed),
        }
    }
}
