use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::{CacheBackend, MemoryCacheBackend};
use super::keys::key_mentions_ticker;
use super::merge::merge_records;
use super::monitor::{hit_rate, CacheMonitor};
use super::{CacheEntry, CacheNamespace, ValueKind};
use crate::errors::CacheError;

/// Default lifetime of stored analysis results.
pub const DEFAULT_ANALYSIS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-namespace default TTLs applied by the typed helpers.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    ttls: HashMap<CacheNamespace, Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        let mut ttls = HashMap::new();
        ttls.insert(CacheNamespace::AnalysisResults, DEFAULT_ANALYSIS_TTL);
        Self { ttls }
    }
}

impl CachePolicy {
    /// A policy where nothing expires.
    pub fn never_expire() -> Self {
        Self {
            ttls: HashMap::new(),
        }
    }

    pub fn with_ttl(mut self, namespace: CacheNamespace, ttl: Duration) -> Self {
        self.ttls.insert(namespace, ttl);
        self
    }

    pub fn ttl(&self, namespace: CacheNamespace) -> Option<Duration> {
        self.ttls.get(&namespace).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub namespace: CacheNamespace,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub namespaces: Vec<NamespaceStats>,
    pub total_entries: usize,
    pub approximate_size_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Lookups answered from cache instead of a provider call.
    pub api_calls_saved: u64,
}

/// Namespaced cache with per-kind write semantics.
///
/// List namespaces merge new records into the stored list, first-seen-wins on
/// the record's natural key. Scalar namespaces overwrite. Expired entries read
/// as misses and are replaced by the next write.
///
/// Writes are read-merge-store without a lock spanning the three steps, so two
/// concurrent writers to the same key may lose one side's additions.
pub struct MergeCache {
    backend: Arc<dyn CacheBackend>,
    monitor: CacheMonitor,
    policy: CachePolicy,
}

impl MergeCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            monitor: CacheMonitor::new(),
            policy: CachePolicy::default(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheBackend::new()))
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Returns the live value for `(namespace, key)`.
    ///
    /// `bypass` forces a miss. Backend failures are logged and read as a miss,
    /// and so is an empty list in a list namespace.
    pub fn get(&self, namespace: CacheNamespace, key: &str, bypass: bool) -> Option<Value> {
        if bypass {
            return None;
        }

        let entry = match self.backend.load(namespace, key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache read failed for {}/{}, treating as miss: {}", namespace, key, e);
                None
            }
        };

        match entry {
            Some(entry)
                if !entry.is_expired_at(Utc::now()) && !is_empty_list(namespace, &entry.value) =>
            {
                self.monitor.record_hit(namespace);
                debug!("Cache hit: {}/{}", namespace, key);
                Some(entry.value)
            }
            _ => {
                self.monitor.record_miss(namespace);
                None
            }
        }
    }

    /// Writes `value` under `(namespace, key)`.
    ///
    /// List namespaces require `value` to be an array and merge it into the
    /// live stored list. If the existing entry cannot be read the write is
    /// skipped, since storing without it would discard merged history.
    /// Concurrent writers to one key are not serialized; the last store wins.
    pub fn set(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let now = Utc::now();
        let value = match namespace.kind() {
            ValueKind::Scalar => value,
            ValueKind::List { key_field } => {
                let Value::Array(incoming) = value else {
                    return Err(CacheError::KindMismatch { namespace });
                };
                let existing = match self.backend.load(namespace, key)? {
                    Some(entry) if !entry.is_expired_at(now) => match entry.value {
                        Value::Array(records) => records,
                        _ => Vec::new(),
                    },
                    _ => Vec::new(),
                };
                Value::Array(merge_records(existing, incoming, key_field))
            }
        };

        self.backend
            .store(namespace, key, CacheEntry::new(value, now, ttl))
    }

    /// Typed read of a record list. Undecodable values read as a miss.
    pub fn get_records<T: DeserializeOwned>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        bypass: bool,
    ) -> Option<Vec<T>> {
        let value = self.get(namespace, key, bypass)?;
        match serde_json::from_value(value) {
            Ok(records) => Some(records),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}/{}: {}", namespace, key, e);
                None
            }
        }
    }

    /// Typed merge-write of a record list using the policy TTL.
    pub fn set_records<T: Serialize>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        records: &[T],
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(records)?;
        self.set(namespace, key, value, self.policy.ttl(namespace))
    }

    pub fn get_scalar<T: DeserializeOwned>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        bypass: bool,
    ) -> Option<T> {
        let value = self.get(namespace, key, bypass)?;
        serde_json::from_value(value)
            .map_err(|e| warn!("Discarding undecodable cache entry {}/{}: {}", namespace, key, e))
            .ok()
    }

    pub fn set_scalar<T: Serialize>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        self.set(namespace, key, value, self.policy.ttl(namespace))
    }

    pub fn keys(&self, namespace: CacheNamespace) -> Result<Vec<String>, CacheError> {
        self.backend.keys(namespace)
    }

    pub fn remove(&self, namespace: CacheNamespace, key: &str) -> Result<bool, CacheError> {
        self.backend.remove(namespace, key)
    }

    /// Drops every entry, or every entry under `namespace`.
    pub fn clear(&self, namespace: Option<CacheNamespace>) -> Result<usize, CacheError> {
        let removed = self.backend.clear(namespace)?;
        if namespace.is_none() {
            self.monitor.reset();
        }
        Ok(removed)
    }

    /// Drops every entry whose key belongs to `ticker`, across all namespaces.
    pub fn clear_by_ticker(&self, ticker: &str) -> Result<usize, CacheError> {
        let mut removed = 0;
        for namespace in CacheNamespace::ALL {
            for key in self.backend.keys(namespace)? {
                if key_mentions_ticker(&key, ticker) && self.backend.remove(namespace, &key)? {
                    removed += 1;
                }
            }
        }
        debug!("Cleared {} cache entries for {}", removed, ticker);
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let counts: HashMap<CacheNamespace, usize> =
            self.backend.entry_counts()?.into_iter().collect();

        let namespaces: Vec<NamespaceStats> = CacheNamespace::ALL
            .into_iter()
            .map(|namespace| {
                let (hits, misses) = self.monitor.counts(namespace);
                NamespaceStats {
                    namespace,
                    entries: counts.get(&namespace).copied().unwrap_or(0),
                    hits,
                    misses,
                    hit_rate: hit_rate(hits, misses),
                }
            })
            .collect();

        let hits: u64 = namespaces.iter().map(|ns| ns.hits).sum();
        let misses: u64 = namespaces.iter().map(|ns| ns.misses).sum();

        Ok(CacheStats {
            total_entries: namespaces.iter().map(|ns| ns.entries).sum(),
            approximate_size_bytes: self.backend.approximate_size()?,
            hits,
            misses,
            hit_rate: hit_rate(hits, misses),
            api_calls_saved: hits,
            namespaces,
        })
    }

    pub fn flush(&self) -> Result<(), CacheError> {
        self.backend.flush()
    }
}

fn is_empty_list(namespace: CacheNamespace, value: &Value) -> bool {
    matches!(namespace.kind(), ValueKind::List { .. })
        && matches!(value, Value::Array(records) if records.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Backend whose reads and writes always fail.
    struct FailingBackend;

    impl CacheBackend for FailingBackend {
        fn load(&self, _: CacheNamespace, _: &str) -> Result<Option<CacheEntry>, CacheError> {
            Err(CacheError::Backend("disk I/O error".to_string()))
        }

        fn store(&self, _: CacheNamespace, _: &str, _: CacheEntry) -> Result<(), CacheError> {
            Err(CacheError::Backend("disk I/O error".to_string()))
        }

        fn remove(&self, _: CacheNamespace, _: &str) -> Result<bool, CacheError> {
            Ok(false)
        }

        fn keys(&self, _: CacheNamespace) -> Result<Vec<String>, CacheError> {
            Ok(Vec::new())
        }

        fn clear(&self, _: Option<CacheNamespace>) -> Result<usize, CacheError> {
            Ok(0)
        }

        fn entry_counts(&self) -> Result<Vec<(CacheNamespace, usize)>, CacheError> {
            Ok(Vec::new())
        }

        fn approximate_size(&self) -> Result<u64, CacheError> {
            Ok(0)
        }
    }

    #[test]
    fn test_backend_read_failure_is_a_miss() {
        let cache = MergeCache::new(Arc::new(FailingBackend));

        assert!(cache.get(CacheNamespace::Prices, "AAPL", false).is_none());
        assert!(cache
            .get_records::<Value>(CacheNamespace::Prices, "AAPL", false)
            .is_none());
        assert_eq!(cache.monitor.counts(CacheNamespace::Prices), (0, 2));
    }

    #[test]
    fn test_backend_write_failure_is_reported() {
        let cache = MergeCache::new(Arc::new(FailingBackend));
        let err = cache
            .set(CacheNamespace::MarketCap, "AAPL_2024-01-31", json!(1.0), None)
            .unwrap_err();
        assert_eq!(err, CacheError::Backend("disk I/O error".to_string()));
        assert!(cache
            .set(CacheNamespace::Prices, "AAPL", json!([{"time": "t1"}]), None)
            .is_err());
    }

    #[test]
    fn test_empty_list_is_not_a_hit() {
        let cache = MergeCache::in_memory();
        cache.set(CacheNamespace::CompanyNews, "AAPL", json!([]), None).unwrap();

        assert!(cache.get(CacheNamespace::CompanyNews, "AAPL", false).is_none());
        let stats = cache.stats().unwrap();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.api_calls_saved, 0);
    }

    #[test]
    fn test_duplicate_price_merged_once() {
        let cache = MergeCache::in_memory();
        cache
            .set(
                CacheNamespace::Prices,
                "AAPL",
                json!([{"time": "2024-01-01", "close": 185.0}]),
                None,
            )
            .unwrap();
        cache
            .set(
                CacheNamespace::Prices,
                "AAPL",
                json!([
                    {"time": "2024-01-01", "close": 999.0},
                    {"time": "2024-01-02", "close": 186.0}
                ]),
                None,
            )
            .unwrap();

        let stored = cache.get(CacheNamespace::Prices, "AAPL", false).unwrap();
        let records = stored.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["close"], json!(185.0));
    }

    #[test]
    fn test_scalar_overwrites() {
        let cache = MergeCache::in_memory();
        cache.set(CacheNamespace::MarketCap, "AAPL_2024-01-01", json!(1.0), None).unwrap();
        cache.set(CacheNamespace::MarketCap, "AAPL_2024-01-01", json!(2.0), None).unwrap();
        assert_eq!(
            cache.get(CacheNamespace::MarketCap, "AAPL_2024-01-01", false),
            Some(json!(2.0))
        );
    }

    #[test]
    fn test_list_namespace_rejects_scalar() {
        let cache = MergeCache::in_memory();
        let err = cache
            .set(CacheNamespace::CompanyNews, "AAPL", json!({"date": "x"}), None)
            .unwrap_err();
        assert_eq!(
            err,
            CacheError::KindMismatch {
                namespace: CacheNamespace::CompanyNews
            }
        );
    }

    #[test]
    fn test_bypass_ignores_live_entry() {
        let cache = MergeCache::in_memory();
        cache.set(CacheNamespace::MarketCap, "AAPL", json!(3.0), None).unwrap();
        assert!(cache.get(CacheNamespace::MarketCap, "AAPL", true).is_none());
        assert!(cache.get(CacheNamespace::MarketCap, "AAPL", false).is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = MergeCache::in_memory();
        cache
            .set(
                CacheNamespace::Prices,
                "AAPL",
                json!([{"time": "2024-01-01"}]),
                Some(Duration::from_millis(50)),
            )
            .unwrap();
        assert!(cache.get(CacheNamespace::Prices, "AAPL", false).is_some());

        std::thread::sleep(Duration::from_millis(80));
        assert!(cache.get(CacheNamespace::Prices, "AAPL", false).is_none());
    }

    #[test]
    fn test_expired_entry_not_merged() {
        let cache = MergeCache::in_memory();
        cache
            .set(
                CacheNamespace::Prices,
                "AAPL",
                json!([{"time": "2024-01-01"}]),
                Some(Duration::from_millis(20)),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(40));
        cache
            .set(CacheNamespace::Prices, "AAPL", json!([{"time": "2024-01-02"}]), None)
            .unwrap();

        let stored = cache.get(CacheNamespace::Prices, "AAPL", false).unwrap();
        assert_eq!(stored, json!([{"time": "2024-01-02"}]));
    }

    #[test]
    fn test_clear_by_ticker_spares_other_symbols() {
        let cache = MergeCache::in_memory();
        cache.set(CacheNamespace::Prices, "AAPL_2024-01-01_2024-01-31", json!([]), None).unwrap();
        cache.set(CacheNamespace::MarketCap, "AAPL_2024-01-31", json!(1.0), None).unwrap();
        cache.set(CacheNamespace::MarketCap, "AAPLX_2024-01-31", json!(1.0), None).unwrap();
        cache.set(CacheNamespace::AnalysisResults, "run_AAPL_valuation", json!({}), None).unwrap();

        assert_eq!(cache.clear_by_ticker("aapl").unwrap(), 3);
        assert_eq!(
            cache.keys(CacheNamespace::MarketCap).unwrap(),
            vec!["AAPLX_2024-01-31".to_string()]
        );
    }

    #[test]
    fn test_stats_counts_and_hit_rate() {
        let cache = MergeCache::in_memory();
        cache.set(CacheNamespace::Prices, "AAPL", json!([{"time": "t1"}]), None).unwrap();
        cache.set(CacheNamespace::MarketCap, "AAPL", json!(1.0), None).unwrap();

        cache.get(CacheNamespace::Prices, "AAPL", false);
        cache.get(CacheNamespace::Prices, "MSFT", false);
        cache.get(CacheNamespace::Prices, "AAPL", true);

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.api_calls_saved, 1);
        assert!(stats.approximate_size_bytes > 0);

        let prices = stats
            .namespaces
            .iter()
            .find(|ns| ns.namespace == CacheNamespace::Prices)
            .unwrap();
        assert_eq!(prices.entries, 1);
        assert!((prices.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_typed_helpers_use_policy_ttl() {
        let cache = MergeCache::in_memory().with_policy(
            CachePolicy::never_expire().with_ttl(CacheNamespace::AnalysisResults, Duration::from_millis(20)),
        );
        cache
            .set_scalar(CacheNamespace::AnalysisResults, "AAPL_dcf", &json!({"signal": "bullish"}))
            .unwrap();
        let value: Option<Value> = cache.get_scalar(CacheNamespace::AnalysisResults, "AAPL_dcf", false);
        assert!(value.is_some());

        std::thread::sleep(Duration::from_millis(40));
        let value: Option<Value> = cache.get_scalar(CacheNamespace::AnalysisResults, "AAPL_dcf", false);
        assert!(value.is_none());
    }
}
