//! Domain types and the merge-aware cache shared by the finsource crates.
//!
//! This crate has no network or database dependencies. Storage backends and
//! provider clients live in sibling crates and plug in through
//! [`cache::CacheBackend`].

pub mod cache;
pub mod errors;
pub mod models;

pub use cache::{CacheBackend, CacheNamespace, CacheStats, MergeCache};
pub use errors::{CacheError, Error, Result, ValidationError};
pub use models::DataKind;
