//! Common test utilities for amas-services
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::common::fixtures::LimiterFactory;
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let (limiter, clock) = LimiterFactory::with_limits(3, 100, 1000);
//!     clock.advance(std::time::Duration::from_secs(1));
//!     // ...
//! }
//! ```

pub mod assertions;

// Re-export commonly used items
pub use fixtures::{CallCounter, DedupFactory, LimiterFactory, T0};

/// Skip test if environment variable is not set
#[macro_export]
macro_rules! skip_without_env {
    ($var:expr) => {
        if std::env::var($var).is_err() {
            eprintln!("Skipping test: {} environment variable not set", $var);
            return;
        }
    };
}
