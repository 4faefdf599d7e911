//! Durable queue of pending remote mutations

use crate::{Result, SyncError};
use astro_common::{now_millis, HttpMethod, Priority};
use astro_store::{Partition, RecordStore, StoreError};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A mutation waiting to be replayed against the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    pub id: String,
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Enqueue time (ms)
    pub timestamp: i64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub priority: Priority,
    /// Ids of items that must leave the queue before this one is sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<i64>,
}

impl SyncQueueItem {
    pub fn dependencies(&self) -> &[String] {
        self.dependencies.as_deref().unwrap_or_default()
    }
}

/// Everything the caller decides about a queued mutation
#[derive(Debug, Clone, PartialEq)]
pub struct NewQueueItem {
    pub method: HttpMethod,
    pub url: String,
    pub data: Option<Value>,
    pub max_retries: u32,
    pub priority: Priority,
    pub dependencies: Option<Vec<String>>,
    pub data_type: Option<String>,
}

impl NewQueueItem {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            data: None,
            max_retries: 3,
            priority: Priority::Medium,
            dependencies: None,
            data_type: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }
}

/// `sync_<ms>_<9 lowercase alphanumerics>`
pub fn generate_id(now: i64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("sync_{}_{}", now, suffix)
}

/// Queue view over the `syncQueue` partition
#[derive(Clone)]
pub struct SyncQueue {
    store: Arc<RecordStore>,
}

impl SyncQueue {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Persist a new item and return its generated id
    pub fn enqueue(&self, new: NewQueueItem) -> Result<String> {
        if new.url.trim().is_empty() {
            return Err(SyncError::InvalidItem("url must not be empty".to_string()));
        }
        if new.max_retries == 0 {
            return Err(SyncError::InvalidItem(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        let now = now_millis();
        let item = SyncQueueItem {
            id: generate_id(now),
            method: new.method,
            url: new.url,
            data: new.data,
            timestamp: now,
            retry_count: 0,
            max_retries: new.max_retries,
            priority: new.priority,
            dependencies: new.dependencies.filter(|deps| !deps.is_empty()),
            data_type: new.data_type,
            last_attempt: None,
        };

        self.store.put(Partition::SyncQueue, &item)?;
        tracing::debug!(
            "Queued {} {} as {} ({})",
            item.method,
            item.url,
            item.id,
            item.priority
        );
        Ok(item.id)
    }

    pub fn get(&self, id: &str) -> Result<Option<SyncQueueItem>> {
        Ok(self.store.get(Partition::SyncQueue, id)?)
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Drop an item; removing an unknown id is a no-op
    pub fn remove(&self, id: &str) -> Result<()> {
        Ok(self.store.delete(Partition::SyncQueue, id)?)
    }

    /// Items in replay order: priority rank, then enqueue time, then
    /// insertion order. `Some(tier)` restricts the listing to that tier.
    pub fn list_by_priority(&self, priority: Option<Priority>) -> Result<Vec<SyncQueueItem>> {
        let mut items: Vec<SyncQueueItem> = match priority {
            Some(tier) => self
                .store
                .get_all_by_index(Partition::SyncQueue, "priority", tier.as_str())?,
            None => self.store.get_all(Partition::SyncQueue)?,
        };
        items.sort_by_key(|item| (item.priority.rank(), item.timestamp));
        Ok(items)
    }

    /// Record a failed attempt: set `retryCount` and stamp `lastAttempt`
    pub fn update_retry(&self, id: &str, retry_count: u32) -> Result<()> {
        let mut item = self.require(id)?;
        item.retry_count = retry_count;
        item.last_attempt = Some(now_millis());
        self.store.put(Partition::SyncQueue, &item)?;
        Ok(())
    }

    /// Swap the payload, keeping position and retry state
    pub fn replace_data(&self, id: &str, data: Value) -> Result<()> {
        let mut item = self.require(id)?;
        item.data = Some(data);
        self.store.put(Partition::SyncQueue, &item)?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.store.count(Partition::SyncQueue)?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<()> {
        Ok(self.store.clear(Partition::SyncQueue)?)
    }

    fn require(&self, id: &str) -> Result<SyncQueueItem> {
        self.get(id)?
            .ok_or_else(|| SyncError::Store(StoreError::ItemNotFound(id.to_string())))
    }
}
