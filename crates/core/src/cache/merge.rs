//! Append-only merge of record lists keyed by a natural key field.

use serde_json::Value;
use std::collections::HashSet;

/// Extracts the natural key of a JSON record as a string.
///
/// Returns `None` for non-objects and records missing the field or holding `null`.
pub fn natural_key(record: &Value, key_field: &str) -> Option<String> {
    match record.get(key_field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Merges `incoming` into `existing`, first-seen-wins.
///
/// Existing records are never replaced, even when `incoming` carries a
/// different value for the same natural key. Incoming records without a key
/// are dropped. The result never holds two records with the same key.
pub fn merge_records(existing: Vec<Value>, incoming: Vec<Value>, key_field: &str) -> Vec<Value> {
    let mut seen: HashSet<String> = HashSet::with_capacity(existing.len() + incoming.len());
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());

    for record in existing {
        match natural_key(&record, key_field) {
            Some(key) => {
                if seen.insert(key) {
                    merged.push(record);
                }
            }
            // Keyless records already stored stay where they are.
            None => merged.push(record),
        }
    }

    for record in incoming {
        if let Some(key) = natural_key(&record, key_field) {
            if seen.insert(key) {
                merged.push(record);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_seen_wins() {
        let existing = vec![json!({"time": "2024-01-01", "close": 1.0})];
        let incoming = vec![
            json!({"time": "2024-01-01", "close": 99.0}),
            json!({"time": "2024-01-02", "close": 2.0}),
        ];

        let merged = merge_records(existing, incoming, "time");
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0]["close"], json!(1.0));
        assert_eq!(merged[1]["time"], "2024-01-02");
    }

    #[test]
    fn test_duplicates_within_batch_collapse() {
        let incoming = vec![
            json!({"date": "2024-01-01", "title": "a"}),
            json!({"date": "2024-01-01", "title": "b"}),
        ];
        let merged = merge_records(Vec::new(), incoming, "date");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["title"], "a");
    }

    #[test]
    fn test_incoming_without_key_dropped() {
        let incoming = vec![json!({"title": "no date"}), json!({"date": null})];
        assert!(merge_records(Vec::new(), incoming, "date").is_empty());
    }

    #[test]
    fn test_numeric_keys() {
        assert_eq!(natural_key(&json!({"time": 1704067200}), "time"), Some("1704067200".into()));
        assert_eq!(natural_key(&json!("scalar"), "time"), None);
    }
}
