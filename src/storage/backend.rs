//! Window store capability

use crate::core::window::{WindowDecision, WindowSpec};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which implementation holds the windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Redis,
    Failover,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Redis => "redis",
            StorageBackend::Failover => "failover",
        };
        f.write_str(name)
    }
}

/// The unit of rate-limit state: one identity on one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub identity: String,
    pub endpoint: String,
}

impl WindowKey {
    pub fn new(identity: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identity, self.endpoint)
    }
}

/// Storage for sliding-window logs
#[async_trait]
pub trait WindowStore: Send + Sync + fmt::Debug {
    /// Purge, check and optionally record `now` across `windows` for `key`.
    ///
    /// The whole sequence is atomic per key: two concurrent calls never both
    /// take the last free slot.
    async fn acquire(
        &self,
        key: &WindowKey,
        windows: &[WindowSpec],
        now_millis: u64,
        record: bool,
    ) -> Result<WindowDecision>;

    /// Drop every window of `identity` on every endpoint, returning how many
    /// endpoints were cleared
    async fn clear(&self, identity: &str) -> Result<usize>;

    /// Number of `(identity, endpoint)` pairs currently holding state
    async fn tracked_keys(&self) -> Result<usize>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;

    /// Release state that has fully expired, returning how many keys were dropped
    async fn cleanup(&self, now_millis: u64) -> Result<usize>;

    fn backend(&self) -> StorageBackend;

    /// Whether state is currently shared with other instances
    fn distributed_available(&self) -> bool {
        false
    }
}
