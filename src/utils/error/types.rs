//! Core error type definitions

use thiserror::Error;

/// Result type alias for the services
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Main error type for the services
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors (rejected limits, TTLs, capacities)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backing store errors that are not Redis protocol errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Redis errors
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}
