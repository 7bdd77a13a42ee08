//! Request deduplication
//!
//! This module collapses concurrent identical requests into a single
//! execution and shares the outcome with every caller.

mod deduplicator;
mod key;
mod types;


pub use deduplicator::RequestDeduplicator;
pub use key::DedupKey;
pub use types::{DedupError, DedupStats};
