//! Utility modules shared by the services
//!
//! - **error**: error taxonomy and the crate `Result` alias
//! - **logging**: tracing subscriber setup and log sanitisation
//! - **time**: clock abstraction used by the sliding windows

pub mod error;
pub mod logging;
pub mod time;

pub use error::{Result, ServiceError};
pub use time::{Clock, ManualClock, SystemClock};
