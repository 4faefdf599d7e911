//! Envelope for cached values with expiry metadata.

use astro_common::now_millis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A cached value plus its bookkeeping.
///
/// When `ttl` is set the item is expired once `now - timestamp >= ttl`;
/// a zero TTL therefore expires immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageItem<T> {
    pub id: String,
    pub data: T,
    /// Creation/update instant (ms since epoch)
    pub timestamp: i64,
    /// Time to live in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(default = "default_version")]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

fn default_version() -> i64 {
    1
}

impl<T> StorageItem<T> {
    pub fn new(id: impl Into<String>, data: T) -> Self {
        Self {
            id: id.into(),
            data,
            timestamp: now_millis(),
            ttl: None,
            version: default_version(),
            metadata: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Whether the item is expired at instant `now` (ms since epoch)
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_sub(self.timestamp) >= ttl,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }
}
