//! Storage-specific error types for SQLite operations.
//!
//! Diesel and r2d2 errors are wrapped in [`StorageError`] and converted to the
//! backend-agnostic [`CacheError`] before leaving this crate.

use diesel::result::Error as DieselError;
use finsource_core::CacheError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for CacheError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SerializationError(e) => CacheError::Serialization(e),
            other => CacheError::Backend(other.to_string()),
        }
    }
}
