//! Deduplication in front of rate limiting
//!
//! Identical concurrent requests are collapsed first, so only the one
//! execution that actually reaches the downstream API consumes quota. A
//! rate-limit denial is shared with every joined caller like any other
//! outcome.

use crate::core::dedup::{DedupError, DedupKey, RequestDeduplicator};
use crate::core::rate_limiter::{RateLimitResult, RateLimiter};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Denial carried through the deduplicator to every waiter
#[derive(Debug, Clone, Error)]
#[error("rate limit exceeded")]
pub struct RateLimitExceeded(pub RateLimitResult);

/// Why a guarded request did not produce a value
#[derive(Debug, Clone, Error)]
pub enum GuardError {
    #[error("rate limit exceeded, retry after {:?}", .0.retry_after)]
    RateLimited(RateLimitResult),
    #[error(transparent)]
    Request(DedupError),
}

impl GuardError {
    fn from_dedup(error: DedupError) -> Self {
        match error.downcast_ref::<RateLimitExceeded>() {
            Some(RateLimitExceeded(result)) => Self::RateLimited(result.clone()),
            None => Self::Request(error),
        }
    }

    /// Rate limit outcome, when the request was denied
    pub fn rate_limit(&self) -> Option<&RateLimitResult> {
        match self {
            Self::RateLimited(result) => Some(result),
            Self::Request(_) => None,
        }
    }
}

/// Runs requests through a deduplicator and a rate limiter
#[derive(Debug, Clone)]
pub struct RequestGuard<T> {
    limiter: Arc<RateLimiter>,
    dedup: RequestDeduplicator<T>,
}

impl<T> RequestGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(limiter: Arc<RateLimiter>, dedup: RequestDeduplicator<T>) -> Self {
        Self { limiter, dedup }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn deduplicator(&self) -> &RequestDeduplicator<T> {
        &self.dedup
    }

    /// Execute `request_fn` for `identity` on `endpoint`.
    ///
    /// Requests are deduplicated per identity and endpoint, so two identities
    /// sending the same payload are limited separately.
    pub async fn execute<R, F, Fut, E>(
        &self,
        identity: &str,
        endpoint: &str,
        request: &R,
        request_fn: F,
    ) -> Result<T, GuardError>
    where
        R: Serialize + Sync + ?Sized,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let limiter = Arc::clone(&self.limiter);
        let owned_identity = identity.to_string();
        let owned_endpoint = endpoint.to_string();
        let guarded = move || async move {
            let decision = limiter
                .check_endpoint(&owned_identity, &owned_endpoint)
                .await;
            if !decision.allowed {
                return Err(anyhow::Error::new(RateLimitExceeded(decision)));
            }
            request_fn().await.map_err(Into::<anyhow::Error>::into)
        };

        let outcome = match DedupKey::from_request(&(identity, endpoint, request)) {
            Ok(key) => self.dedup.deduplicate_with_key(key, guarded).await,
            Err(e) => {
                warn!("Failed to derive deduplication key, executing without deduplication: {}", e);
                self.dedup.execute_alone(guarded).await
            }
        };

        outcome.map_err(GuardError::from_dedup)
    }
}
