//! Storage backends for [`MergeCache`](super::MergeCache).

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::warn;

use super::{CacheEntry, CacheNamespace};
use crate::errors::CacheError;

/// Raw key-value persistence underneath the merge logic.
///
/// Implementations only store and return entries; merge semantics, expiry
/// checks and statistics live in `MergeCache`.
pub trait CacheBackend: Send + Sync {
    fn load(&self, namespace: CacheNamespace, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    fn store(&self, namespace: CacheNamespace, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    /// Removes one entry. Returns whether it existed.
    fn remove(&self, namespace: CacheNamespace, key: &str) -> Result<bool, CacheError>;

    fn keys(&self, namespace: CacheNamespace) -> Result<Vec<String>, CacheError>;

    /// Removes every entry, or every entry in one namespace. Returns the count removed.
    fn clear(&self, namespace: Option<CacheNamespace>) -> Result<usize, CacheError>;

    /// Number of stored entries per namespace. Empty namespaces may be omitted.
    fn entry_counts(&self) -> Result<Vec<(CacheNamespace, usize)>, CacheError>;

    /// Rough size of stored values in bytes.
    fn approximate_size(&self) -> Result<u64, CacheError>;

    /// Persists pending writes. Called on shutdown.
    fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Process-local backend. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    entries: RwLock<HashMap<CacheNamespace, HashMap<String, CacheEntry>>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheNamespace, HashMap<String, CacheEntry>>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Memory cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheNamespace, HashMap<String, CacheEntry>>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Memory cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn load(&self, namespace: CacheNamespace, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self
            .read()
            .get(&namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn store(&self, namespace: CacheNamespace, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.write()
            .entry(namespace)
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, namespace: CacheNamespace, key: &str) -> Result<bool, CacheError> {
        Ok(self
            .write()
            .get_mut(&namespace)
            .and_then(|entries| entries.remove(key))
            .is_some())
    }

    fn keys(&self, namespace: CacheNamespace) -> Result<Vec<String>, CacheError> {
        let mut keys: Vec<String> = self
            .read()
            .get(&namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    fn clear(&self, namespace: Option<CacheNamespace>) -> Result<usize, CacheError> {
        let mut guard = self.write();
        let removed = match namespace {
            Some(ns) => guard.remove(&ns).map(|entries| entries.len()).unwrap_or(0),
            None => {
                let total = guard.values().map(HashMap::len).sum();
                guard.clear();
                total
            }
        };
        Ok(removed)
    }

    fn entry_counts(&self) -> Result<Vec<(CacheNamespace, usize)>, CacheError> {
        Ok(self
            .read()
            .iter()
            .map(|(ns, entries)| (*ns, entries.len()))
            .collect())
    }

    fn approximate_size(&self) -> Result<u64, CacheError> {
        let guard = self.read();
        let bytes = guard
            .values()
            .flat_map(|entries| entries.iter())
            .map(|(key, entry)| key.len() + entry.value.to_string().len())
            .sum::<usize>();
        Ok(bytes as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_store_load_remove() {
        let backend = MemoryCacheBackend::new();
        let entry = CacheEntry::new(json!([1, 2]), Utc::now(), None);
        backend.store(CacheNamespace::Prices, "AAPL", entry.clone()).unwrap();

        assert_eq!(backend.load(CacheNamespace::Prices, "AAPL").unwrap(), Some(entry));
        assert!(backend.load(CacheNamespace::MarketCap, "AAPL").unwrap().is_none());
        assert!(backend.remove(CacheNamespace::Prices, "AAPL").unwrap());
        assert!(!backend.remove(CacheNamespace::Prices, "AAPL").unwrap());
    }

    #[test]
    fn test_clear_scoped_and_global() {
        let backend = MemoryCacheBackend::new();
        let now = Utc::now();
        backend.store(CacheNamespace::Prices, "A", CacheEntry::new(json!([]), now, None)).unwrap();
        backend.store(CacheNamespace::Prices, "B", CacheEntry::new(json!([]), now, None)).unwrap();
        backend.store(CacheNamespace::MarketCap, "A", CacheEntry::new(json!(1.0), now, None)).unwrap();

        assert_eq!(backend.clear(Some(CacheNamespace::Prices)).unwrap(), 2);
        assert_eq!(backend.keys(CacheNamespace::MarketCap).unwrap(), vec!["A".to_string()]);
        assert_eq!(backend.clear(None).unwrap(), 1);
        assert_eq!(backend.approximate_size().unwrap(), 0);
    }
}
