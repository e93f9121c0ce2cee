//! Merge-aware namespaced cache.
//!
//! ```text
//!  get_*/set_*  ──►  MergeCache  ──►  CacheBackend (memory | sqlite)
//!                       │
//!                       ├─ list namespaces: append-only merge on natural key
//!                       └─ scalar namespaces: overwrite
//! ```

mod backend;
mod entry;
mod keys;
mod merge;
mod merge_cache;
mod monitor;
mod namespace;

pub use backend::{CacheBackend, MemoryCacheBackend};
pub use entry::CacheEntry;
pub use keys::{analysis_key, key_mentions_ticker, CacheKeyed};
pub use merge::{merge_records, natural_key};
pub use merge_cache::{CachePolicy, CacheStats, MergeCache, NamespaceStats, DEFAULT_ANALYSIS_TTL};
pub use monitor::{hit_rate, CacheMonitor};
pub use namespace::{CacheNamespace, ValueKind};
