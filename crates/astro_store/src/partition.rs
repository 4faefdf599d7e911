//! Named partitions of the record store and their secondary indexes.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named collection inside the record store.
///
/// Each partition maps to one table. Secondary index names are the
/// top-level JSON field names of the stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Partition {
    Cache,
    SyncQueue,
    UserData,
    Equipment,
    Sequences,
}

impl Partition {
    pub const ALL: [Partition; 5] = [
        Partition::Cache,
        Partition::SyncQueue,
        Partition::UserData,
        Partition::Equipment,
        Partition::Sequences,
    ];

    /// Logical name, as used in backups and on the command line
    pub fn name(self) -> &'static str {
        match self {
            Partition::Cache => "cache",
            Partition::SyncQueue => "syncQueue",
            Partition::UserData => "userData",
            Partition::Equipment => "equipment",
            Partition::Sequences => "sequences",
        }
    }

    /// Backing table (see `schema.sql`)
    pub(crate) fn table(self) -> &'static str {
        match self {
            Partition::Cache => "cache",
            Partition::SyncQueue => "sync_queue",
            Partition::UserData => "user_data",
            Partition::Equipment => "equipment",
            Partition::Sequences => "sequences",
        }
    }

    /// Secondary indexes, in column order
    pub fn indexes(self) -> &'static [&'static str] {
        match self {
            Partition::Cache => &["timestamp", "ttl"],
            Partition::SyncQueue => &["timestamp", "priority", "retryCount"],
            Partition::UserData => &["userId", "type"],
            Partition::Equipment => &["userId", "type", "status"],
            Partition::Sequences => &["userId", "status", "targetId"],
        }
    }

    pub(crate) fn check_index(self, index_name: &str) -> Result<(), StoreError> {
        if self.indexes().iter().any(|name| *name == index_name) {
            Ok(())
        } else {
            Err(StoreError::UnknownIndex {
                partition: self.name().to_string(),
                index: index_name.to_string(),
            })
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Partition {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Partition::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s) || p.table() == s)
            .ok_or_else(|| StoreError::UnknownPartition(s.to_string()))
    }
}
