use std::path::Path;
use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use finsource_core::cache::CacheEntry;
use finsource_core::{CacheBackend, CacheError, CacheNamespace};
use log::{debug, warn};

use super::model::CacheEntryDB;
use crate::db::{self, get_connection, DbPool};
use crate::errors::StorageError;
use crate::schema::cache_entries;

#[derive(QueryableByName)]
struct SizeRow {
    #[diesel(sql_type = BigInt)]
    total: i64,
}

/// [`CacheBackend`] over a pooled SQLite database.
///
/// Entries survive restarts. Writes are `INSERT OR REPLACE` on the
/// `(namespace, cache_key)` primary key.
pub struct SqliteCacheBackend {
    pool: Arc<DbPool>,
}

impl SqliteCacheBackend {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Creates the database if needed, applies migrations and pools connections.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let db_path = db::init(&path)?;
        let pool = db::create_pool(&db_path)?;
        db::run_migrations(&pool)?;
        debug!("Opened SQLite cache at {}", db_path);
        Ok(Self::new(pool))
    }

    fn load_row(
        &self,
        namespace: CacheNamespace,
        key: &str,
    ) -> Result<Option<CacheEntry>, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        let row = cache_entries::table
            .find((namespace.as_str(), key))
            .select(CacheEntryDB::as_select())
            .first::<CacheEntryDB>(&mut conn)
            .optional()?;
        row.map(CacheEntry::try_from).transpose()
    }

    fn store_row(
        &self,
        namespace: CacheNamespace,
        key: &str,
        entry: &CacheEntry,
    ) -> Result<(), StorageError> {
        let row = CacheEntryDB::from_entry(namespace, key, entry)?;
        let mut conn = get_connection(&self.pool)?;
        diesel::replace_into(cache_entries::table)
            .values(&row)
            .execute(&mut conn)?;
        Ok(())
    }

    fn delete_row(&self, namespace: CacheNamespace, key: &str) -> Result<bool, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        let deleted = diesel::delete(cache_entries::table.find((namespace.as_str(), key)))
            .execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn list_keys(&self, namespace: CacheNamespace) -> Result<Vec<String>, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        Ok(cache_entries::table
            .filter(cache_entries::namespace.eq(namespace.as_str()))
            .select(cache_entries::cache_key)
            .order(cache_entries::cache_key.asc())
            .load::<String>(&mut conn)?)
    }

    fn delete_namespace(&self, namespace: Option<CacheNamespace>) -> Result<usize, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        let deleted = match namespace {
            Some(ns) => diesel::delete(
                cache_entries::table.filter(cache_entries::namespace.eq(ns.as_str())),
            )
            .execute(&mut conn)?,
            None => diesel::delete(cache_entries::table).execute(&mut conn)?,
        };
        Ok(deleted)
    }

    fn count_by_namespace(&self) -> Result<Vec<(CacheNamespace, usize)>, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        let rows = cache_entries::table
            .group_by(cache_entries::namespace)
            .select((cache_entries::namespace, count_star()))
            .load::<(String, i64)>(&mut conn)?;

        Ok(rows
            .into_iter()
            .filter_map(|(name, count)| match name.parse::<CacheNamespace>() {
                Ok(ns) => Some((ns, usize::try_from(count).unwrap_or(0))),
                Err(_) => {
                    warn!("Ignoring {} rows in unknown cache namespace '{}'", count, name);
                    None
                }
            })
            .collect())
    }

    fn total_value_bytes(&self) -> Result<u64, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        let row = diesel::sql_query(
            "SELECT COALESCE(SUM(LENGTH(value)), 0) AS total FROM cache_entries",
        )
        .get_result::<SizeRow>(&mut conn)?;
        Ok(u64::try_from(row.total).unwrap_or(0))
    }

    fn checkpoint(&self) -> Result<(), StorageError> {
        let mut conn = get_connection(&self.pool)?;
        conn.batch_execute("PRAGMA wal_checkpoint(TRUNCATE);")?;
        debug!("SQLite cache checkpointed");
        Ok(())
    }
}

impl CacheBackend for SqliteCacheBackend {
    fn load(&self, namespace: CacheNamespace, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.load_row(namespace, key)?)
    }

    fn store(&self, namespace: CacheNamespace, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        Ok(self.store_row(namespace, key, &entry)?)
    }

    fn remove(&self, namespace: CacheNamespace, key: &str) -> Result<bool, CacheError> {
        Ok(self.delete_row(namespace, key)?)
    }

    fn keys(&self, namespace: CacheNamespace) -> Result<Vec<String>, CacheError> {
        Ok(self.list_keys(namespace)?)
    }

    fn clear(&self, namespace: Option<CacheNamespace>) -> Result<usize, CacheError> {
        Ok(self.delete_namespace(namespace)?)
    }

    fn entry_counts(&self) -> Result<Vec<(CacheNamespace, usize)>, CacheError> {
        Ok(self.count_by_namespace()?)
    }

    fn approximate_size(&self) -> Result<u64, CacheError> {
        Ok(self.total_value_bytes()?)
    }

    fn flush(&self) -> Result<(), CacheError> {
        Ok(self.checkpoint()?)
    }
}
