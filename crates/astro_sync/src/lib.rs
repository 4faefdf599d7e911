//! # AstroSync Sync Engine
//!
//! Replays locally queued mutations against the remote API once connectivity
//! and priority allow.
//!
//! ## Architecture
//!
//! - **Queue**: [`SyncQueue`] persists pending mutations in the `syncQueue`
//!   partition of the offline store
//! - **Strategies**: `immediate`, `batch` and `background` passes, each bound to
//!   one priority tier with its own batch size, retry budget and conflict policy
//! - **Network**: [`NetworkMonitor`] tracks connectivity and signals when a
//!   reconnect has settled
//! - **Coordinator**: [`SyncCoordinator`] runs at most one pass at a time and
//!   reports each outcome to listeners and the notification sink
//!
//! ## Usage
//!
//! ```rust,no_run
//! use astro_common::HttpMethod;
//! use astro_store::{RecordStore, StoreOptions};
//! use astro_sync::{
//!     HttpApiClient, NetworkMonitor, QueueOptions, SyncConfig, SyncCoordinator, SyncQueue,
//!     TracingNotifier,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> astro_sync::Result<()> {
//!     let store = Arc::new(RecordStore::open("offline.db".as_ref(), StoreOptions::default())?);
//!     let config = SyncConfig::default();
//!     let notifier = Arc::new(TracingNotifier);
//!     let network = Arc::new(NetworkMonitor::new(true, config.settle_delay, notifier.clone()));
//!
//!     let coordinator = Arc::new(SyncCoordinator::new(
//!         SyncQueue::new(store),
//!         Arc::new(HttpApiClient::new(config.api_base_url.clone())),
//!         network,
//!         notifier,
//!         config,
//!     ));
//!     coordinator.start();
//!
//!     coordinator.queue_for_sync(
//!         HttpMethod::Post,
//!         "/api/sessions",
//!         Some(serde_json::json!({"target": "M42"})),
//!         QueueOptions::default(),
//!     )?;
//!
//!     let result = coordinator.sync_all().await?;
//!     println!("synced {} items", result.synced_items);
//!     coordinator.shutdown();
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod coordinator;
pub mod network;
pub mod notify;
pub mod queue;
pub mod resolver;
pub mod strategy;

pub use api::{ApiClient, ApiRequest, ApiResponse, HttpApiClient};
pub use config::SyncConfig;
pub use coordinator::{
    ListenerHandle, PriorityCounts, QueueOptions, SyncCoordinator, SyncResult, SyncStatus,
};
pub use network::{NetworkEvent, NetworkMonitor};
pub use notify::{Notification, NotificationLevel, NotificationSink, TracingNotifier};
pub use queue::{NewQueueItem, SyncQueue, SyncQueueItem};
pub use resolver::{Conflict, ConflictHandler, ConflictResolver, Resolution};
pub use strategy::{ConflictResolution, StrategySet, SyncStrategy};

use astro_store::StoreError;

/// Common result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown sync strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid queue item: {0}")]
    InvalidItem(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// The queue item targeted by a partial update no longer exists
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Store(StoreError::ItemNotFound(_)))
    }
}
