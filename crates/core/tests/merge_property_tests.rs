//! Property-based tests for the merge cache.
//!
//! Records are generated as small JSON objects keyed on `time` so that key
//! collisions between batches are frequent.

use finsource_core::cache::{merge_records, natural_key, CacheNamespace, MergeCache};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;

// =============================================================================
// Generators
// =============================================================================

/// A price-like record whose key is drawn from a narrow day range.
fn arb_record() -> impl Strategy<Value = Value> {
    (1u32..=20, 0u32..1000).prop_map(|(day, close)| {
        json!({
            "time": format!("2024-01-{:02}", day),
            "close": close,
        })
    })
}

fn arb_batch() -> impl Strategy<Value = Vec<Value>> {
    proptest::collection::vec(arb_record(), 0..12)
}

/// Two batches whose natural keys never overlap: days 1..=10 vs 11..=20.
fn arb_disjoint_batches() -> impl Strategy<Value = (Vec<Value>, Vec<Value>)> {
    let low = proptest::collection::vec((1u32..=10, 0u32..1000), 0..8);
    let high = proptest::collection::vec((11u32..=20, 0u32..1000), 0..8);
    (low, high).prop_map(|(low, high)| {
        let to_records = |pairs: Vec<(u32, u32)>| {
            pairs
                .into_iter()
                .map(|(day, close)| json!({"time": format!("2024-01-{:02}", day), "close": close}))
                .collect::<Vec<_>>()
        };
        (to_records(low), to_records(high))
    })
}

fn key_set(records: &[Value]) -> HashSet<String> {
    records.iter().filter_map(|r| natural_key(r, "time")).collect()
}

fn stored(cache: &MergeCache, key: &str) -> Vec<Value> {
    cache
        .get(CacheNamespace::Prices, key, false)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Merging the same batch twice changes nothing the second time.
    #[test]
    fn prop_merge_is_idempotent(existing in arb_batch(), incoming in arb_batch()) {
        let once = merge_records(existing, incoming.clone(), "time");
        let twice = merge_records(once.clone(), incoming, "time");
        prop_assert_eq!(once, twice);
    }

    /// Disjoint batches produce the same key set in either order.
    #[test]
    fn prop_merge_commutes_on_disjoint_keys(
        existing in arb_batch(),
        (a, b) in arb_disjoint_batches(),
    ) {
        let ab = merge_records(merge_records(existing.clone(), a.clone(), "time"), b.clone(), "time");
        let ba = merge_records(merge_records(existing, b, "time"), a, "time");
        prop_assert_eq!(key_set(&ab), key_set(&ba));
        prop_assert_eq!(ab.len(), ba.len());
    }

    /// No sequence of writes leaves two records with the same natural key.
    #[test]
    fn prop_no_duplicate_natural_keys(batches in proptest::collection::vec(arb_batch(), 1..6)) {
        let cache = MergeCache::in_memory();
        for batch in batches {
            cache
                .set(CacheNamespace::Prices, "AAPL", Value::Array(batch), None)
                .unwrap();
            let records = stored(&cache, "AAPL");
            prop_assert_eq!(key_set(&records).len(), records.len());
        }
    }

    /// A read after a write returns the write merged into what was there.
    #[test]
    fn prop_round_trip_matches_merge(first in arb_batch(), second in arb_batch()) {
        let cache = MergeCache::in_memory();
        cache.set(CacheNamespace::Prices, "MSFT", Value::Array(first.clone()), None).unwrap();
        prop_assert_eq!(stored(&cache, "MSFT"), merge_records(Vec::new(), first.clone(), "time"));

        cache.set(CacheNamespace::Prices, "MSFT", Value::Array(second.clone()), None).unwrap();
        let expected = merge_records(merge_records(Vec::new(), first, "time"), second, "time");
        prop_assert_eq!(stored(&cache, "MSFT"), expected);
    }

    /// Bypass always misses, whatever was written.
    #[test]
    fn prop_bypass_always_misses(batch in arb_batch()) {
        let cache = MergeCache::in_memory();
        cache.set(CacheNamespace::Prices, "NVDA", Value::Array(batch), None).unwrap();
        prop_assert!(cache.get(CacheNamespace::Prices, "NVDA", true).is_none());
    }

    /// Existing records survive any later batch unchanged.
    #[test]
    fn prop_existing_records_never_replaced(existing in arb_batch(), incoming in arb_batch()) {
        let baseline = merge_records(Vec::new(), existing, "time");
        let merged = merge_records(baseline.clone(), incoming, "time");
        prop_assert_eq!(&merged[..baseline.len()], &baseline[..]);
    }
}
