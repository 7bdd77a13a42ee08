//! Error handling for the services
//!
//! This module defines the error type shared by the rate limiter, the
//! request deduplicator and their storage backends.

mod helpers;
mod types;

pub use types::{Result, ServiceError};
