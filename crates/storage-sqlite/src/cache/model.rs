//! Database model for cache entries.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use finsource_core::cache::CacheEntry;
use finsource_core::CacheNamespace;

use crate::errors::StorageError;

/// One row of `cache_entries`. Timestamps are stored as RFC 3339 text in UTC.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::cache_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CacheEntryDB {
    pub namespace: String,
    pub cache_key: String,
    pub value: String,
    pub written_at: String,
    pub expires_at: Option<String>,
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::SerializationError(format!("invalid timestamp '{}': {}", raw, e)))
}

impl CacheEntryDB {
    pub fn from_entry(
        namespace: CacheNamespace,
        key: &str,
        entry: &CacheEntry,
    ) -> Result<Self, StorageError> {
        let value = serde_json::to_string(&entry.value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        Ok(Self {
            namespace: namespace.as_str().to_string(),
            cache_key: key.to_string(),
            value,
            written_at: format_timestamp(entry.written_at),
            expires_at: entry.expires_at.map(format_timestamp),
        })
    }
}

impl TryFrom<CacheEntryDB> for CacheEntry {
    type Error = StorageError;

    fn try_from(row: CacheEntryDB) -> Result<Self, Self::Error> {
        let value = serde_json::from_str(&row.value).map_err(|e| {
            StorageError::SerializationError(format!(
                "corrupt value for {}/{}: {}",
                row.namespace, row.cache_key, e
            ))
        })?;
        Ok(CacheEntry {
            value,
            written_at: parse_timestamp(&row.written_at)?,
            expires_at: row.expires_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_row_conversion_keeps_timestamps() {
        let now = Utc::now();
        let entry = CacheEntry::new(json!({"x": 1}), now, Some(Duration::from_secs(60)));
        let row = CacheEntryDB::from_entry(CacheNamespace::AnalysisResults, "k", &entry).unwrap();
        assert_eq!(row.namespace, "analysis_results");
        assert!(row.written_at.ends_with('Z'));

        let back = CacheEntry::try_from(row).unwrap();
        assert_eq!(back.value, entry.value);
        // Stored with microsecond precision.
        assert_eq!(back.written_at.timestamp_micros(), now.timestamp_micros());
        assert!(back.expires_at.is_some());
    }

    #[test]
    fn test_corrupt_value_is_serialization_error() {
        let row = CacheEntryDB {
            namespace: "prices".to_string(),
            cache_key: "AAPL".to_string(),
            value: "{not json".to_string(),
            written_at: format_timestamp(Utc::now()),
            expires_at: None,
        };
        assert!(matches!(
            CacheEntry::try_from(row),
            Err(StorageError::SerializationError(_))
        ));
    }
}
