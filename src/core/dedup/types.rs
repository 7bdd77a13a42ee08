//! Deduplicator type definitions

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Outcome shared with every caller of a deduplicated request
#[derive(Debug, Clone, Error)]
pub enum DedupError {
    /// The request itself failed; displays as the original error
    #[error("{0}")]
    Failed(Arc<anyhow::Error>),
    /// The shared execution was cancelled before it finished
    #[error("deduplicated request was cancelled")]
    Cancelled,
    /// The deduplicator no longer accepts requests
    #[error("request deduplicator has been shut down")]
    Shutdown,
}

impl DedupError {
    pub fn failed<E: Into<anyhow::Error>>(error: E) -> Self {
        Self::Failed(Arc::new(error.into()))
    }

    /// Borrow the original error if it is of type `E`
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Failed(error) => error.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Lock-free counters updated on the request path
#[derive(Debug, Default)]
pub(super) struct AtomicDedupStats {
    pub(super) total_requests: AtomicU64,
    pub(super) executions: AtomicU64,
    pub(super) deduplicated: AtomicU64,
    pub(super) evictions: AtomicU64,
}

impl AtomicDedupStats {
    pub(super) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn bump_by(counter: &AtomicU64, amount: u64) {
        if amount > 0 {
            counter.fetch_add(amount, Ordering::Relaxed);
        }
    }
}

/// Deduplicator statistics snapshot
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub enabled: bool,
    /// Registry entries, including completed ones still lingering
    pub in_flight: usize,
    /// Calls received
    pub total_requests: u64,
    /// Calls that ran the request function
    pub executions: u64,
    /// Calls that joined an existing execution
    pub deduplicated: u64,
    /// Entries dropped for exceeding the TTL or the capacity
    pub evictions: u64,
}

impl DedupStats {
    /// Share of calls served by another call's execution
    pub fn dedup_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.deduplicated as f64 / self.total_requests as f64
        }
    }
}
