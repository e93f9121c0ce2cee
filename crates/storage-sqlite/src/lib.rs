//! SQLite cache backend for finsource.
//!
//! This crate is the only place Diesel appears. It implements
//! [`finsource_core::cache::CacheBackend`] and contains:
//! - Connection pooling and PRAGMA setup
//! - Embedded Diesel migrations
//! - The `cache_entries` table model and repository
//!
//! ```text
//!   finsource-core (MergeCache)
//!            │ CacheBackend
//!            ▼
//!   storage-sqlite (this crate)
//!            │
//!            ▼
//!        SQLite DB
//! ```

pub mod cache;
pub mod db;
pub mod errors;
pub mod schema;

pub use cache::SqliteCacheBackend;
pub use db::{create_pool, get_connection, init, run_migrations, DbConnection, DbPool};
pub use errors::StorageError;
