//! Configuration validation
//!
//! This module provides validation logic for all configuration structures.
//!
//! - `trait_def`: Core Validate trait definition
//! - `rate_limit_validators`: RateLimitConfig and RateLimiterSettings
//! - `dedup_validators`: DeduplicationConfig
//! - `storage_validators`: RedisConfig
//! - `tests`: Test suite for all validators

mod dedup_validators;
mod rate_limit_validators;
mod storage_validators;
mod trait_def;

pub use trait_def::Validate;
