//! Persistent cache entries.

mod model;
mod repository;

pub use model::CacheEntryDB;
pub use repository::SqliteCacheBackend;
