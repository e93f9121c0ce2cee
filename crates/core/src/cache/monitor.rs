use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::CacheNamespace;

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Lock-free hit/miss counters, one pair per namespace.
#[derive(Debug)]
pub struct CacheMonitor {
    counters: HashMap<CacheNamespace, Counters>,
}

impl Default for CacheMonitor {
    fn default() -> Self {
        Self {
            counters: CacheNamespace::ALL
                .into_iter()
                .map(|ns| (ns, Counters::default()))
                .collect(),
        }
    }
}

impl CacheMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, namespace: CacheNamespace) {
        if let Some(c) = self.counters.get(&namespace) {
            c.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_miss(&self, namespace: CacheNamespace) {
        if let Some(c) = self.counters.get(&namespace) {
            c.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// `(hits, misses)` for one namespace.
    pub fn counts(&self, namespace: CacheNamespace) -> (u64, u64) {
        self.counters
            .get(&namespace)
            .map(|c| (c.hits.load(Ordering::Relaxed), c.misses.load(Ordering::Relaxed)))
            .unwrap_or((0, 0))
    }

    pub fn reset(&self) {
        for c in self.counters.values() {
            c.hits.store(0, Ordering::Relaxed);
            c.misses.store(0, Ordering::Relaxed);
        }
    }
}

/// Hits over lookups, 0.0 when nothing was looked up.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
