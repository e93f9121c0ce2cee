//! Core error types for finsource.
//!
//! Storage-specific errors (Diesel, SQLite, ...) are converted into [`CacheError`]
//! by the storage layer so this crate stays backend-agnostic.

use thiserror::Error;

use crate::cache::CacheNamespace;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the core crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cache operation failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Errors raised by a cache backend or while (de)serializing cached values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend I/O failed: {0}")]
    Backend(String),

    #[error("Failed to serialize cached value: {0}")]
    Serialization(String),

    #[error("Namespace '{namespace}' expects a list of records")]
    KindMismatch { namespace: CacheNamespace },

    #[error("Unknown cache namespace: {0}")]
    UnknownNamespace(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Ticker must not be empty")]
    EmptyTicker,

    #[error("Start date {start} is after end date {end}")]
    InvertedDateRange { start: String, end: String },

    #[error("Unknown period: {0}")]
    UnknownPeriod(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
