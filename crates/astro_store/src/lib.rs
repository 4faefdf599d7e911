//! # AstroSync Offline Store
//!
//! Durable, transactional record storage for offline-first operation.
//!
//! ## Architecture
//!
//! - **Partitions**: named collections (`cache`, `syncQueue`, `userData`,
//!   `equipment`, `sequences`), one SQLite table each
//! - **Indexes**: secondary indexes over top-level record fields
//! - **Expiry**: records carrying `timestamp` + `ttl` are treated as absent once
//!   the TTL has elapsed and are removed lazily or by [`RecordStore::scan_and_expire`]
//! - **Quota recovery**: a full partition evicts expired, then oldest, records and
//!   retries the write once
//!
//! ## Usage
//!
//! ```rust,no_run
//! use astro_store::{OfflineStorage, RecordStore, StoreOptions};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! fn main() -> astro_store::Result<()> {
//!     let store = Arc::new(RecordStore::open("offline.db".as_ref(), StoreOptions::default())?);
//!     let storage = OfflineStorage::new(store.clone());
//!
//!     storage.cache_set("last-target", &"M31", Some(Duration::from_secs(3600)))?;
//!     let target: Option<String> = storage.cache_get("last-target")?;
//!     assert_eq!(target.as_deref(), Some("M31"));
//!
//!     store.close()
//! }
//! ```

pub mod item;
pub mod offline;
pub mod partition;
pub mod records;
pub mod store;

pub use item::StorageItem;
pub use offline::{Backup, OfflineStorage, StorageStats, BACKUP_FORMAT_VERSION};
pub use partition::Partition;
pub use records::{EquipmentRecord, SequenceRecord, UserDataRecord};
pub use store::{RecordStore, StoreOptions};

/// Common result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded in partition '{partition}'")]
    QuotaExceeded { partition: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Unknown partition: {0}")]
    UnknownPartition(String),

    #[error("Unknown index '{index}' on partition '{partition}'")]
    UnknownIndex { partition: String, index: String },

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DiskFull) => StoreError::QuotaExceeded {
                partition: "unknown".to_string(),
            },
            Some(rusqlite::ErrorCode::CannotOpen) | Some(rusqlite::ErrorCode::NotADatabase) => {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Database(e),
        }
    }
}
