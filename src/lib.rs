//! # amas-services
//!
//! Request admission for services that front rate-limited downstream APIs.
//!
//! ## Features
//!
//! - **Sliding-window rate limiting**: per-identity minute, hour and day
//!   ceilings, evaluated per endpoint
//! - **Shared state**: windows kept in Redis when available, in process
//!   memory otherwise
//! - **Request deduplication**: concurrent identical requests share a single
//!   execution and its outcome
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use amas_services::{DeduplicationConfig, RateLimitConfig, RateLimiter, RateLimiterSettings, RequestDeduplicator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let limiter = RateLimiter::in_memory(RateLimiterSettings::default())?;
//!     limiter.set_config("user1", RateLimitConfig::new(3, 100, 1000))?;
//!
//!     let result = limiter.check("user1").await;
//!     println!("allowed={} remaining={}", result.allowed, result.remaining);
//!
//!     let dedup = RequestDeduplicator::<String>::new(DeduplicationConfig::default())?;
//!     let answer = dedup
//!         .deduplicate("what is rust?", || async {
//!             Ok::<_, anyhow::Error>("a language".to_string())
//!         })
//!         .await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod storage;
pub mod utils;

// Re-export main types
pub use config::{Config, DeduplicationConfig, RateLimitConfig, RateLimiterSettings, RedisConfig};
pub use core::dedup::{DedupError, DedupKey, DedupStats, RequestDeduplicator};
pub use core::guard::{GuardError, RateLimitExceeded, RequestGuard};
pub use core::rate_limiter::{
    DEFAULT_ENDPOINT, RateLimitResult, RateLimiter, RateLimiterStats, UNBOUNDED_REMAINING,
};
pub use core::window::{WindowKind, WindowSpec};
pub use storage::{StorageBackend, WindowStore, connect_store};
pub use utils::error::{Result, ServiceError};
pub use utils::time::{Clock, ManualClock, SystemClock};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Build information
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    /// Seconds since the Unix epoch
    pub build_time: &'static str,
    pub git_hash: &'static str,
    pub rust_version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: VERSION,
            build_time: env!("BUILD_TIME"),
            git_hash: env!("GIT_HASH"),
            rust_version: env!("RUST_VERSION"),
        }
    }
}

/// Build metadata embedded at compile time
pub fn build_info() -> BuildInfo {
    BuildInfo::default()
}
