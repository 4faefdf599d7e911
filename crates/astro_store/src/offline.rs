//! Application-facing storage facade over [`RecordStore`]

use crate::{
    EquipmentRecord, Partition, RecordStore, Result, SequenceRecord, StorageItem, StoreError,
    UserDataRecord,
};
use astro_common::now_millis;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Current backup file format
pub const BACKUP_FORMAT_VERSION: u32 = 1;

/// Full dump of every partition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub version: u32,
    pub exported_at: i64,
    /// Records keyed by partition name
    pub partitions: BTreeMap<String, Vec<Value>>,
}

/// Row counts per partition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageStats {
    pub partitions: BTreeMap<String, usize>,
    pub total: usize,
}

/// Offline storage for cache entries and domain records
#[derive(Clone)]
pub struct OfflineStorage {
    store: Arc<RecordStore>,
}

impl OfflineStorage {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Cache a value, optionally with a time to live. Overwrites bump the version.
    pub fn cache_set<T: Serialize>(&self, key: &str, data: &T, ttl: Option<Duration>) -> Result<()> {
        let previous: Option<StorageItem<Value>> = self.store.get(Partition::Cache, key)?;

        let mut item = StorageItem::new(key, serde_json::to_value(data)?);
        item.version = previous.map_or(1, |p| p.version + 1);
        if let Some(ttl) = ttl {
            item = item.with_ttl(ttl);
        }

        self.store.put(Partition::Cache, &item)
    }

    /// Read a cached value; expired or undecodable entries read as `None`
    pub fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let item: Option<StorageItem<Value>> = self.store.get(Partition::Cache, key)?;
        match item {
            Some(item) => match serde_json::from_value(item.data) {
                Ok(data) => Ok(Some(data)),
                Err(e) => {
                    tracing::warn!("Cached value '{}' has unexpected shape: {}", key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Full cache envelope, including version and timestamps
    pub fn cache_entry(&self, key: &str) -> Result<Option<StorageItem<Value>>> {
        self.store.get(Partition::Cache, key)
    }

    pub fn cache_delete(&self, key: &str) -> Result<()> {
        self.store.delete(Partition::Cache, key)
    }

    pub fn cache_clear(&self) -> Result<()> {
        self.store.clear(Partition::Cache)
    }

    pub fn save_user_data(&self, record: &UserDataRecord) -> Result<()> {
        self.store.put(Partition::UserData, record)
    }

    pub fn user_data_for(&self, user_id: &str) -> Result<Vec<UserDataRecord>> {
        self.store.get_all_by_index(Partition::UserData, "userId", user_id)
    }

    pub fn save_equipment(&self, record: &EquipmentRecord) -> Result<()> {
        self.store.put(Partition::Equipment, record)
    }

    pub fn equipment_for(&self, user_id: &str) -> Result<Vec<EquipmentRecord>> {
        self.store.get_all_by_index(Partition::Equipment, "userId", user_id)
    }

    pub fn equipment_by_status(&self, status: &str) -> Result<Vec<EquipmentRecord>> {
        self.store.get_all_by_index(Partition::Equipment, "status", status)
    }

    pub fn save_sequence(&self, record: &SequenceRecord) -> Result<()> {
        self.store.put(Partition::Sequences, record)
    }

    pub fn sequences_for(&self, user_id: &str) -> Result<Vec<SequenceRecord>> {
        self.store.get_all_by_index(Partition::Sequences, "userId", user_id)
    }

    pub fn sequences_for_target(&self, target_id: &str) -> Result<Vec<SequenceRecord>> {
        self.store.get_all_by_index(Partition::Sequences, "targetId", target_id)
    }

    /// Sweep expired records from every partition
    pub fn cleanup_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for partition in Partition::ALL {
            removed += self.store.scan_and_expire(partition)?;
        }
        if removed > 0 {
            tracing::info!("Cleanup removed {} expired records", removed);
        }
        Ok(removed)
    }

    pub fn stats(&self) -> Result<StorageStats> {
        let mut stats = StorageStats::default();
        for partition in Partition::ALL {
            let count = self.store.count(partition)?;
            stats.partitions.insert(partition.name().to_string(), count);
            stats.total += count;
        }
        Ok(stats)
    }

    /// Dump every live record
    pub fn export_backup(&self) -> Result<Backup> {
        let mut partitions = BTreeMap::new();
        for partition in Partition::ALL {
            let records: Vec<Value> = self.store.get_all(partition)?;
            partitions.insert(partition.name().to_string(), records);
        }
        Ok(Backup {
            version: BACKUP_FORMAT_VERSION,
            exported_at: now_millis(),
            partitions,
        })
    }

    /// Restore records from a JSON backup.
    ///
    /// The whole document is validated before anything is written; existing
    /// records with the same id are overwritten. Returns the number of records
    /// imported.
    pub fn import_backup(&self, json: &str) -> Result<usize> {
        let backup: Backup = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidBackup(format!("unreadable backup: {}", e)))?;

        if backup.version != BACKUP_FORMAT_VERSION {
            return Err(StoreError::InvalidBackup(format!(
                "unsupported backup version {} (expected {})",
                backup.version, BACKUP_FORMAT_VERSION
            )));
        }

        let mut batches = Vec::with_capacity(backup.partitions.len());
        for (name, records) in &backup.partitions {
            let partition: Partition = name
                .parse()
                .map_err(|_| StoreError::InvalidBackup(format!("unknown partition '{}'", name)))?;

            for (i, record) in records.iter().enumerate() {
                let has_id = record
                    .get("id")
                    .and_then(Value::as_str)
                    .is_some_and(|id| !id.is_empty());
                if !has_id {
                    return Err(StoreError::InvalidBackup(format!(
                        "record {} in '{}' has no id",
                        i, name
                    )));
                }
            }
            batches.push((partition, records));
        }

        let mut imported = 0;
        for (partition, records) in batches {
            for record in records {
                self.store.put(partition, record)?;
                imported += 1;
            }
        }

        tracing::info!("Imported {} records from backup", imported);
        Ok(imported)
    }
}
