//! Wiring of store, network monitor and coordinator for one CLI invocation

use anyhow::Context;
use astro_config::Config;
use astro_store::{OfflineStorage, RecordStore, StoreOptions};
use astro_sync::{
    HttpApiClient, NetworkMonitor, NotificationSink, SyncConfig, SyncCoordinator, SyncQueue,
    TracingNotifier,
};
use std::sync::Arc;

/// Overrides `sync.auth_token` from the config file
pub const API_TOKEN_ENV: &str = "ASTROSYNC_API_TOKEN";

pub struct App {
    pub config: Config,
    pub storage: OfflineStorage,
    pub coordinator: Arc<SyncCoordinator>,
}

impl App {
    /// Open the workspace store and build a coordinator around it.
    ///
    /// `offline` forces the network monitor's initial state; otherwise
    /// `network.assume_online` decides.
    pub fn open(config: Config, offline: bool) -> anyhow::Result<Self> {
        let db_path = config.db_path();
        let store = RecordStore::open(
            &db_path,
            StoreOptions {
                max_records_per_partition: config.storage.max_records_per_partition,
            },
        )
        .with_context(|| format!("Failed to open offline store at {:?}", db_path))?;
        let store = Arc::new(store);

        let mut sync_config = SyncConfig::try_from(&config.sync)?;
        if let Ok(token) = std::env::var(API_TOKEN_ENV) {
            if !token.is_empty() {
                sync_config.auth_token = Some(token);
            }
        }

        let mut client = HttpApiClient::new(sync_config.api_base_url.clone());
        if let Some(token) = &sync_config.auth_token {
            client = client.with_auth_token(token.clone());
        }

        let notifier: Arc<dyn NotificationSink> = Arc::new(TracingNotifier);
        let online = !offline && config.network.assume_online;
        let network = Arc::new(NetworkMonitor::new(
            online,
            sync_config.settle_delay,
            notifier.clone(),
        ));

        let coordinator = Arc::new(SyncCoordinator::new(
            SyncQueue::new(store.clone()),
            Arc::new(client),
            network,
            notifier,
            sync_config,
        ));

        Ok(Self {
            config,
            storage: OfflineStorage::new(store),
            coordinator,
        })
    }

    /// Let in-flight passes finish, stop background tasks and close the store
    pub async fn close(&self) -> anyhow::Result<()> {
        self.coordinator.drain_passes().await;
        self.coordinator.shutdown();
        self.storage.store().close()?;
        Ok(())
    }
}
