//! SQLite-backed record store
//!
//! Every public operation opens its own transaction; nothing spans calls.

use crate::{Partition, Result, StoreError};
use astro_common::now_millis;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Tuning knobs for a [`RecordStore`]
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Upper bound on rows per partition; inserting a new key beyond it
    /// raises [`StoreError::QuotaExceeded`]
    pub max_records_per_partition: Option<usize>,
}

/// Durable record store manager
pub struct RecordStore {
    conn: Mutex<Option<Connection>>,
    options: StoreOptions,
    location: String,
}

/// A record ready to be written: primary key, JSON body and index columns
struct EncodedRecord {
    id: String,
    body: String,
    expires_at: Option<i64>,
    index_values: Vec<SqlValue>,
}

impl EncodedRecord {
    fn encode<T: Serialize>(partition: Partition, item: &T) -> Result<Self> {
        let value = serde_json::to_value(item)?;
        let obj = value.as_object().ok_or_else(|| {
            StoreError::InvalidRecord("record must serialize to a JSON object".to_string())
        })?;

        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                StoreError::InvalidRecord(format!(
                    "record for '{}' is missing a string id",
                    partition
                ))
            })?
            .to_string();

        let expires_at = match (
            obj.get("timestamp").and_then(Value::as_i64),
            obj.get("ttl").and_then(Value::as_i64),
        ) {
            (Some(timestamp), Some(ttl)) => Some(timestamp.saturating_add(ttl)),
            _ => None,
        };

        let index_values = partition
            .indexes()
            .iter()
            .map(|name| json_to_sql(obj.get(*name)))
            .collect();

        Ok(Self {
            id,
            body: serde_json::to_string(&value)?,
            expires_at,
            index_values,
        })
    }
}

/// Map a JSON field onto the SQLite value used for index lookups
fn json_to_sql(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

/// A body that is not JSON at all; a shape mismatch with the caller's type is not corruption
fn is_corrupt(body: &str) -> bool {
    serde_json::from_str::<Value>(body).is_err()
}

fn is_expired(expires_at: Option<i64>, now: i64) -> bool {
    matches!(expires_at, Some(at) if at <= now)
}

fn upsert_sql(partition: Partition) -> String {
    let mut columns = vec!["id".to_string(), "body".to_string(), "expires_at".to_string()];
    columns.extend(partition.indexes().iter().map(|c| format!("\"{}\"", c)));

    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = columns[1..]
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        partition.table(),
        columns.join(", "),
        placeholders,
        updates
    )
}

impl RecordStore {
    /// Open or create a store at `path`
    pub fn open(path: &Path, options: StoreOptions) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {:?}: {}", parent, e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::Unavailable(format!("failed to open store at {:?}: {}", path, e))
        })?;

        let store = Self::with_connection(conn, options, path.display().to_string())?;
        tracing::info!("Offline store opened at {:?}", path);
        Ok(store)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory(options: StoreOptions) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StoreError::Unavailable(format!("failed to open in-memory store: {}", e))
        })?;
        Self::with_connection(conn, options, ":memory:".to_string())
    }

    fn with_connection(conn: Connection, options: StoreOptions, location: String) -> Result<Self> {
        conn.execute_batch(include_str!("schema.sql")).map_err(|e| {
            StoreError::Unavailable(format!("failed to initialize schema: {}", e))
        })?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            options,
            location,
        })
    }

    /// Where this store lives (file path or `:memory:`)
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Close the connection. Later operations fail with [`StoreError::Unavailable`].
    pub fn close(&self) -> Result<()> {
        let conn = self.lock()?.take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| StoreError::from(e))?;
            tracing::info!("Offline store closed ({})", self.location);
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn with_tx<R>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<R>) -> Result<R> {
        let mut guard = self.lock()?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| StoreError::Unavailable("store is closed".to_string()))?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Insert or replace a record by its `id` field.
    ///
    /// If the partition is full, expired and then oldest records are evicted
    /// and the write is retried exactly once.
    pub fn put<T: Serialize>(&self, partition: Partition, item: &T) -> Result<()> {
        let record = EncodedRecord::encode(partition, item)?;

        match self.try_put(partition, &record) {
            Err(StoreError::QuotaExceeded { .. }) => {
                tracing::warn!("Quota exceeded in '{}', reclaiming space", partition);
                self.reclaim(partition)?;
                self.try_put(partition, &record)
            }
            other => other,
        }
    }

    fn try_put(&self, partition: Partition, record: &EncodedRecord) -> Result<()> {
        let table = partition.table();
        let quota = self.options.max_records_per_partition;

        self.with_tx(|tx| {
            if let Some(max) = quota {
                let exists: bool = tx.query_row(
                    &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table),
                    [&record.id],
                    |row| row.get(0),
                )?;
                if !exists {
                    let count: i64 =
                        tx.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                            row.get(0)
                        })?;
                    if count as usize >= max {
                        return Err(StoreError::QuotaExceeded {
                            partition: partition.name().to_string(),
                        });
                    }
                }
            }

            let mut values = vec![
                SqlValue::Text(record.id.clone()),
                SqlValue::Text(record.body.clone()),
                record.expires_at.map_or(SqlValue::Null, SqlValue::Integer),
            ];
            values.extend(record.index_values.iter().cloned());

            tx.execute(&upsert_sql(partition), params_from_iter(values))
                .map_err(|e| match StoreError::from(e) {
                    StoreError::QuotaExceeded { .. } => StoreError::QuotaExceeded {
                        partition: partition.name().to_string(),
                    },
                    other => other,
                })?;
            tracing::debug!("put {}/{}", partition, record.id);
            Ok(())
        })
    }

    /// Free space in a partition: expired records first, otherwise the oldest tenth
    fn reclaim(&self, partition: Partition) -> Result<usize> {
        let expired = self.scan_and_expire(partition)?;
        if expired > 0 {
            return Ok(expired);
        }
        let count = self.count(partition)?;
        self.evict_oldest(partition, (count / 10).max(1))
    }

    /// Fetch a record. Missing, expired and undecodable records all read as `None`.
    pub fn get<T: DeserializeOwned>(&self, partition: Partition, key: &str) -> Result<Option<T>> {
        let table = partition.table();
        let now = now_millis();

        self.with_tx(|tx| {
            let row: Option<(String, Option<i64>)> = tx
                .query_row(
                    &format!("SELECT body, expires_at FROM {} WHERE id = ?1", table),
                    [key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((body, expires_at)) = row else {
                return Ok(None);
            };

            if is_expired(expires_at, now) {
                tracing::debug!("{}/{} expired, removing", partition, key);
                tx.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [key])?;
                return Ok(None);
            }

            match serde_json::from_str::<T>(&body) {
                Ok(item) => Ok(Some(item)),
                Err(e) => {
                    tracing::warn!("Undecodable record {}/{}: {}", partition, key, e);
                    if is_corrupt(&body) {
                        tx.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [key])?;
                    }
                    Ok(None)
                }
            }
        })
    }

    /// All live records of a partition, in insertion order
    pub fn get_all<T: DeserializeOwned>(&self, partition: Partition) -> Result<Vec<T>> {
        self.load_live(partition, None)
    }

    /// All live records whose `index_name` field equals `value`.
    ///
    /// Results come back in insertion order; callers that need another
    /// order must sort.
    pub fn get_all_by_index<T, V>(
        &self,
        partition: Partition,
        index_name: &str,
        value: V,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        V: Into<Value>,
    {
        partition.check_index(index_name)?;
        let value = value.into();
        self.load_live(partition, Some((index_name, json_to_sql(Some(&value)))))
    }

    fn load_live<T: DeserializeOwned>(
        &self,
        partition: Partition,
        filter: Option<(&str, SqlValue)>,
    ) -> Result<Vec<T>> {
        let table = partition.table();
        let now = now_millis();

        self.with_tx(|tx| {
            let rows: Vec<(String, String, Option<i64>)> = {
                let (sql, args) = match &filter {
                    Some((column, value)) => (
                        format!(
                            "SELECT id, body, expires_at FROM {} WHERE \"{}\" = ?1 ORDER BY rowid",
                            table, column
                        ),
                        vec![value.clone()],
                    ),
                    None => (
                        format!("SELECT id, body, expires_at FROM {} ORDER BY rowid", table),
                        Vec::new(),
                    ),
                };
                let mut stmt = tx.prepare(&sql)?;
                let mapped = stmt.query_map(params_from_iter(args), |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?;
                let collected = mapped.collect::<std::result::Result<Vec<_>, _>>()?;
                collected
            };

            let mut items = Vec::with_capacity(rows.len());
            let mut stale = Vec::new();
            for (id, body, expires_at) in rows {
                if is_expired(expires_at, now) {
                    stale.push(id);
                    continue;
                }
                match serde_json::from_str::<T>(&body) {
                    Ok(item) => items.push(item),
                    Err(e) => {
                        tracing::warn!("Undecodable record {}/{}: {}", partition, id, e);
                        if is_corrupt(&body) {
                            stale.push(id);
                        }
                    }
                }
            }

            for id in &stale {
                tx.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [id])?;
            }

            Ok(items)
        })
    }

    /// Remove a record. Removing a missing key is not an error.
    pub fn delete(&self, partition: Partition, key: &str) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                &format!("DELETE FROM {} WHERE id = ?1", partition.table()),
                [key],
            )?;
            Ok(())
        })
    }

    /// Remove every record in a partition
    pub fn clear(&self, partition: Partition) -> Result<()> {
        let removed = self.with_tx(|tx| {
            Ok(tx.execute(&format!("DELETE FROM {}", partition.table()), [])?)
        })?;
        tracing::info!("Cleared {} records from '{}'", removed, partition);
        Ok(())
    }

    /// Number of stored rows (expired rows not yet swept included)
    pub fn count(&self, partition: Partition) -> Result<usize> {
        self.with_tx(|tx| {
            let count: i64 = tx.query_row(
                &format!("SELECT COUNT(*) FROM {}", partition.table()),
                [],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    /// Physically delete every expired record; returns how many were removed
    pub fn scan_and_expire(&self, partition: Partition) -> Result<usize> {
        let now = now_millis();
        let removed = self.with_tx(|tx| {
            Ok(tx.execute(
                &format!(
                    "DELETE FROM {} WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    partition.table()
                ),
                params![now],
            )?)
        })?;
        if removed > 0 {
            tracing::debug!("Expired {} records from '{}'", removed, partition);
        }
        Ok(removed)
    }

    /// Delete the `n` oldest records (by `timestamp`, then insertion order)
    pub fn evict_oldest(&self, partition: Partition, n: usize) -> Result<usize> {
        let table = partition.table();
        let removed = self.with_tx(|tx| {
            Ok(tx.execute(
                &format!(
                    "DELETE FROM {table} WHERE id IN (
                        SELECT id FROM {table}
                        ORDER BY json_extract(body, '$.timestamp'), rowid
                        LIMIT ?1
                    )"
                ),
                params![n as i64],
            )?)
        })?;
        tracing::warn!("Evicted {} oldest records from '{}'", removed, partition);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageItem;
    use serde_json::json;

    fn store() -> RecordStore {
        RecordStore::open_in_memory(StoreOptions::default()).unwrap()
    }

    #[test]
    fn test_put_get_roundtrip() {
        let store = store();
        let item = StorageItem::new("target", json!({"name": "M42"}));
        store.put(Partition::Cache, &item).unwrap();

        let loaded: StorageItem<Value> = store.get(Partition::Cache, "target").unwrap().unwrap();
        assert_eq!(loaded, item);
    }

    #[test]
    fn test_missing_key_is_none() {
        let store = store();
        let loaded: Option<Value> = store.get(Partition::Cache, "nope").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_put_replaces() {
        let store = store();
        store
            .put(Partition::Cache, &StorageItem::new("k", 1))
            .unwrap();
        store
            .put(Partition::Cache, &StorageItem::new("k", 2))
            .unwrap();

        let loaded: StorageItem<i32> = store.get(Partition::Cache, "k").unwrap().unwrap();
        assert_eq!(loaded.data, 2);
        assert_eq!(store.count(Partition::Cache).unwrap(), 1);
    }

    #[test]
    fn test_record_without_id_rejected() {
        let store = store();
        let err = store.put(Partition::Cache, &json!({"data": 1})).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));

        let err = store.put(Partition::Cache, &json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[test]
    fn test_index_lookup() {
        let store = store();
        store
            .put(Partition::Equipment, &json!({"id": "cam", "userId": "u1", "type": "camera", "status": "connected"}))
            .unwrap();
        store
            .put(Partition::Equipment, &json!({"id": "mount", "userId": "u1", "type": "mount", "status": "parked"}))
            .unwrap();
        store
            .put(Partition::Equipment, &json!({"id": "wheel", "userId": "u2", "type": "filterWheel", "status": "connected"}))
            .unwrap();

        let mine: Vec<Value> = store
            .get_all_by_index(Partition::Equipment, "userId", "u1")
            .unwrap();
        assert_eq!(mine.len(), 2);

        let connected: Vec<Value> = store
            .get_all_by_index(Partition::Equipment, "status", "connected")
            .unwrap();
        let ids: Vec<&str> = connected.iter().map(|v| v["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["cam", "wheel"]);
    }

    #[test]
    fn test_integer_index_lookup() {
        let store = store();
        store
            .put(Partition::SyncQueue, &json!({"id": "a", "retryCount": 0}))
            .unwrap();
        store
            .put(Partition::SyncQueue, &json!({"id": "b", "retryCount": 2}))
            .unwrap();

        let retried: Vec<Value> = store
            .get_all_by_index(Partition::SyncQueue, "retryCount", 2)
            .unwrap();
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0]["id"], "b");
    }

    #[test]
    fn test_unknown_index_rejected() {
        let store = store();
        let result: Result<Vec<Value>> = store.get_all_by_index(Partition::Cache, "body", "x");
        assert!(matches!(result, Err(StoreError::UnknownIndex { .. })));
    }

    #[test]
    fn test_delete_idempotent() {
        let store = store();
        store.put(Partition::Cache, &StorageItem::new("k", 1)).unwrap();
        store.delete(Partition::Cache, "k").unwrap();
        store.delete(Partition::Cache, "k").unwrap();
        assert_eq!(store.count(Partition::Cache).unwrap(), 0);
    }

    #[test]
    fn test_clear_partition_only() {
        let store = store();
        store.put(Partition::Cache, &StorageItem::new("k", 1)).unwrap();
        store
            .put(Partition::UserData, &json!({"id": "pref", "userId": "u1"}))
            .unwrap();

        store.clear(Partition::Cache).unwrap();
        assert_eq!(store.count(Partition::Cache).unwrap(), 0);
        assert_eq!(store.count(Partition::UserData).unwrap(), 1);
    }

    #[test]
    fn test_upsert_preserves_insertion_order() {
        let store = store();
        for id in ["a", "b", "c"] {
            store.put(Partition::Cache, &StorageItem::new(id, 0)).unwrap();
        }
        store.put(Partition::Cache, &StorageItem::new("a", 1)).unwrap();

        let all: Vec<StorageItem<i32>> = store.get_all(Partition::Cache).unwrap();
        let ids: Vec<&str> = all.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_upsert_sql_shape() {
        let sql = upsert_sql(Partition::SyncQueue);
        assert!(sql.starts_with("INSERT INTO sync_queue (id, body, expires_at, \"timestamp\""));
        assert!(sql.contains("?6"));
        assert!(sql.contains("\"retryCount\" = excluded.\"retryCount\""));
    }
}
