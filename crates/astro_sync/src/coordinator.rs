//! Sync coordinator: drains the queue one pass at a time

use crate::api::{ApiClient, ApiRequest};
use crate::config::SyncConfig;
use crate::network::{NetworkEvent, NetworkMonitor};
use crate::notify::{Notification, NotificationLevel, NotificationSink};
use crate::queue::{NewQueueItem, SyncQueue, SyncQueueItem};
use crate::resolver::{Conflict, ConflictHandler, ConflictResolver, Resolution};
use crate::strategy::{SyncStrategy, BACKGROUND, BATCH, IMMEDIATE};
use crate::Result;
use astro_common::{now_millis, HttpMethod, Priority};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const IN_PROGRESS: &str = "Sync in progress";
const OFFLINE: &str = "Offline";

/// Outcome of one sync pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// True iff `errors` is empty
    pub success: bool,
    pub synced_items: usize,
    pub failed_items: usize,
    pub conflicts: usize,
    pub skipped_items: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncResult {
    /// Returned when another pass holds the syncing flag
    pub fn in_progress() -> Self {
        Self {
            errors: vec![IN_PROGRESS.to_string()],
            ..Default::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            errors: vec![OFFLINE.to_string()],
            ..Default::default()
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.errors.len() == 1 && self.errors[0] == IN_PROGRESS
    }

    fn finish(mut self, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self.success = self.errors.is_empty();
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PriorityCounts {
    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::Critical => self.critical += 1,
            Priority::High => self.high += 1,
            Priority::Medium => self.medium += 1,
            Priority::Low => self.low += 1,
        }
    }
}

/// Snapshot of the queue and coordinator state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub total_items: usize,
    pub by_priority: PriorityCounts,
    pub oldest_timestamp: Option<i64>,
    pub is_online: bool,
    pub is_syncing: bool,
}

/// Options for [`SyncCoordinator::queue_for_sync`]
#[derive(Debug, Clone, Default)]
pub struct QueueOptions {
    /// Defaults to the strategy's priority
    pub priority: Option<Priority>,
    /// Strategy name; defaults to `batch`
    pub strategy: Option<String>,
    pub dependencies: Option<Vec<String>>,
    /// Key for [`SyncCoordinator::register_conflict_handler`]
    pub data_type: Option<String>,
}

type Listener = Arc<dyn Fn(&SyncResult) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl ListenerRegistry {
    fn lock(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Disposer returned by [`SyncCoordinator::add_sync_listener`]
pub struct ListenerHandle {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl ListenerHandle {
    /// Stop delivering results to the listener
    pub fn dispose(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Resets the syncing flag when a pass ends, however it ends
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives sync passes over the queue
pub struct SyncCoordinator {
    queue: SyncQueue,
    api: Arc<dyn ApiClient>,
    network: Arc<NetworkMonitor>,
    notifier: Arc<dyn NotificationSink>,
    config: SyncConfig,
    is_syncing: AtomicBool,
    listeners: Arc<ListenerRegistry>,
    conflict_handlers: RwLock<HashMap<String, Arc<dyn ConflictHandler>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Passes spawned by `queue_for_sync`
    passes: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncCoordinator {
    pub fn new(
        queue: SyncQueue,
        api: Arc<dyn ApiClient>,
        network: Arc<NetworkMonitor>,
        notifier: Arc<dyn NotificationSink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            queue,
            api,
            network,
            notifier,
            config,
            is_syncing: AtomicBool::new(false),
            listeners: Arc::new(ListenerRegistry::default()),
            conflict_handlers: RwLock::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            passes: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<SyncingGuard<'_>> {
        self.is_syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncingGuard(&self.is_syncing))
    }

    /// Spawn the reconnect listener and the background timer.
    ///
    /// Must be called from within a Tokio runtime. Calling it again while
    /// running does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = lock(&self.tasks);
        if !tasks.is_empty() {
            return;
        }

        let this = Arc::clone(self);
        let mut events = self.network.subscribe();
        tasks.push(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(NetworkEvent::Settled) => {
                        tracing::info!("Connection settled, syncing pending changes");
                        if let Err(e) = this.sync_batch().await {
                            tracing::warn!("Reconnect sync failed: {}", e);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Missed {} network events", missed);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));

        let this = Arc::clone(self);
        let period = self.config.background_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !this.network.is_online() || this.is_syncing() {
                    continue;
                }
                match this.sync_background().await {
                    Ok(result) if result.synced_items > 0 => {
                        tracing::info!("Background sync pushed {} items", result.synced_items)
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Background sync failed: {}", e),
                }
            }
        }));

        tracing::info!(
            "Sync coordinator started (background every {:?})",
            self.config.background_interval
        );
    }

    /// Abort the timers spawned by [`start`](Self::start) and any pass
    /// spawned by [`queue_for_sync`](Self::queue_for_sync)
    pub fn shutdown(&self) {
        let mut tasks: Vec<_> = lock(&self.tasks).drain(..).collect();
        tasks.extend(lock(&self.passes).drain(..));
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            task.abort();
        }
        tracing::info!("Sync coordinator stopped");
    }

    /// Wait for passes spawned by [`queue_for_sync`](Self::queue_for_sync)
    /// to finish. Call before closing the store so a delivered item is also
    /// removed from the queue.
    pub async fn drain_passes(&self) {
        loop {
            let pending: Vec<_> = lock(&self.passes).drain(..).collect();
            if pending.is_empty() {
                return;
            }
            tracing::debug!("Waiting for {} sync pass(es)", pending.len());
            for pass in pending {
                if let Err(e) = pass.await {
                    if !e.is_cancelled() {
                        tracing::warn!("Sync pass panicked: {}", e);
                    }
                }
            }
        }
    }

    /// Queue a mutation and return its id.
    ///
    /// Urgent items (critical or high) trigger an `immediate` pass in the
    /// background when online.
    pub fn queue_for_sync(
        self: &Arc<Self>,
        method: HttpMethod,
        url: impl Into<String>,
        data: Option<Value>,
        options: QueueOptions,
    ) -> Result<String> {
        let strategy = self
            .config
            .strategies
            .get(options.strategy.as_deref().unwrap_or(BATCH))?;
        let priority = options.priority.unwrap_or(strategy.priority);

        let id = self.queue.enqueue(NewQueueItem {
            method,
            url: url.into(),
            data,
            max_retries: strategy.max_retries,
            priority,
            dependencies: options.dependencies,
            data_type: options.data_type,
        })?;

        if priority.is_urgent() && self.network.is_online() {
            self.spawn_pass(IMMEDIATE);
        }
        Ok(id)
    }

    fn spawn_pass(self: &Arc<Self>, strategy: &'static str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; {} pass deferred", strategy);
            return;
        };
        let this = Arc::clone(self);
        let pass = runtime.spawn(async move {
            if let Err(e) = this.sync_with(strategy).await {
                tracing::warn!("{} sync failed: {}", strategy, e);
            }
        });

        let mut passes = lock(&self.passes);
        passes.retain(|pass| !pass.is_finished());
        passes.push(pass);
    }

    pub async fn sync_immediate(&self) -> Result<SyncResult> {
        self.sync_with(IMMEDIATE).await
    }

    pub async fn sync_batch(&self) -> Result<SyncResult> {
        self.sync_with(BATCH).await
    }

    pub async fn sync_background(&self) -> Result<SyncResult> {
        self.sync_with(BACKGROUND).await
    }

    /// Run one pass of the named strategy
    pub async fn sync_with(&self, name: &str) -> Result<SyncResult> {
        let strategy = self.config.strategies.get(name)?.clone();

        let Some(_guard) = self.try_begin() else {
            tracing::debug!("{} pass skipped, sync already running", name);
            return Ok(SyncResult::in_progress());
        };
        self.perform_sync(&strategy).await
    }

    /// Drain every tier, critical first, using the `batch` strategy
    pub async fn sync_all(&self) -> Result<SyncResult> {
        let strategy = self.config.strategies.get(BATCH)?.clone();

        let Some(_guard) = self.try_begin() else {
            return Ok(SyncResult::in_progress());
        };
        if !self.network.is_online() {
            return Ok(SyncResult::offline());
        }

        let started = Instant::now();
        let mut result = SyncResult::default();
        for priority in Priority::ALL {
            let items = self.queue.list_by_priority(Some(priority))?;
            if !items.is_empty() {
                tracing::debug!("Syncing {} {} items", items.len(), priority);
            }
            self.process_items(items, &strategy, &mut result).await;
        }

        let result = result.finish(started);
        self.publish(&result);
        Ok(result)
    }

    #[tracing::instrument(skip(self, strategy), fields(strategy = %strategy.name))]
    async fn perform_sync(&self, strategy: &SyncStrategy) -> Result<SyncResult> {
        if !self.network.is_online() {
            return Ok(SyncResult::offline());
        }

        let started = Instant::now();
        let mut items = self.queue.list_by_priority(Some(strategy.priority))?;
        items.truncate(strategy.batch_size);

        let mut result = SyncResult::default();
        self.process_items(items, strategy, &mut result).await;

        let result = result.finish(started);
        self.publish(&result);
        Ok(result)
    }

    async fn process_items(
        &self,
        items: Vec<SyncQueueItem>,
        strategy: &SyncStrategy,
        result: &mut SyncResult,
    ) {
        for item in items {
            let label = format!("{} {}", item.method, item.url);
            if let Err(e) = self.process_item(item, strategy, result).await {
                tracing::error!("Error syncing {}: {}", label, e);
                result.failed_items += 1;
                result.errors.push(format!("Error syncing {}: {}", label, e));
            }
        }
    }

    async fn process_item(
        &self,
        item: SyncQueueItem,
        strategy: &SyncStrategy,
        result: &mut SyncResult,
    ) -> Result<()> {
        if let Some(dependency) = self.pending_dependency(&item)? {
            tracing::debug!("{} waits for {}", item.id, dependency);
            result.skipped_items += 1;
            return Ok(());
        }
        if strategy.is_backing_off(&item, now_millis()) {
            tracing::debug!("{} is backing off", item.id);
            result.skipped_items += 1;
            return Ok(());
        }

        let request = ApiRequest {
            method: item.method,
            body: item.data.clone(),
            timeout: self.config.request_timeout,
            retries: 0,
        };

        match self.api.request(&item.url, request).await {
            Ok(response) if response.success => {
                self.queue.remove(&item.id)?;
                tracing::debug!("Synced {} {}", item.method, item.url);
                result.synced_items += 1;
            }
            Ok(response) if response.is_conflict() => {
                result.conflicts += 1;
                self.handle_conflict(item, response.body, strategy, result)?;
            }
            Ok(response) => {
                tracing::warn!(
                    "{} {} rejected: {}",
                    item.method,
                    item.url,
                    response.error.as_deref().unwrap_or("unknown error")
                );
                self.record_failure(&item, result)?;
            }
            Err(e) => {
                tracing::warn!("{} {} failed: {}", item.method, item.url, e);
                self.record_failure(&item, result)?;
            }
        }
        Ok(())
    }

    /// First dependency of `item` that is still queued
    fn pending_dependency(&self, item: &SyncQueueItem) -> Result<Option<String>> {
        for dependency in item.dependencies() {
            if self.queue.contains(dependency)? {
                return Ok(Some(dependency.clone()));
            }
        }
        Ok(None)
    }

    /// Count a failed attempt; drop the item once its retries are used up
    fn record_failure(&self, item: &SyncQueueItem, result: &mut SyncResult) -> Result<()> {
        let attempts = item.retry_count + 1;
        if attempts >= item.max_retries {
            self.queue.remove(&item.id)?;
            let message = format!(
                "Failed to sync {} {} after {} attempts",
                item.method, item.url, attempts
            );
            tracing::error!("{}", message);
            result.failed_items += 1;
            result.errors.push(message);
            return Ok(());
        }

        match self.queue.update_retry(&item.id, attempts) {
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} left the queue during the pass", item.id);
                Ok(())
            }
            other => other,
        }
    }

    fn handle_conflict(
        &self,
        item: SyncQueueItem,
        server_data: Option<Value>,
        strategy: &SyncStrategy,
        result: &mut SyncResult,
    ) -> Result<()> {
        let handler = item.data_type.as_ref().and_then(|data_type| {
            self.conflict_handlers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .get(data_type)
                .cloned()
        });

        let conflict = Conflict { item, server_data };
        let resolution = match handler {
            Some(handler) => handler.resolve(&conflict),
            None => ConflictResolver::resolve(strategy.conflict_resolution, &conflict),
        };
        let item = conflict.item;
        tracing::info!("Conflict on {} {}: {:?}", item.method, item.url, resolution);

        match resolution {
            Resolution::KeepServer => self.queue.remove(&item.id),
            Resolution::KeepClient => self.record_failure(&item, result),
            Resolution::Merged(data) => {
                self.queue.replace_data(&item.id, data)?;
                self.record_failure(&item, result)
            }
            Resolution::Deferred => {
                self.notifier.notify(Notification::new(
                    NotificationLevel::Warning,
                    "Sync Conflict",
                    format!("{} {} needs your review", item.method, item.url),
                    "sync",
                ));
                Ok(())
            }
        }
    }

    fn publish(&self, result: &SyncResult) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(result);
        }

        if result.failed_items > 0 || !result.errors.is_empty() {
            self.notifier.notify(Notification::new(
                NotificationLevel::Warning,
                "Sync Issues",
                format!("{} items failed to sync", result.failed_items),
                "sync",
            ));
        } else if result.synced_items > 0 {
            self.notifier.notify(Notification::new(
                NotificationLevel::Success,
                "Sync Complete",
                format!("{} items synced", result.synced_items),
                "sync",
            ));
        }
    }

    pub fn get_sync_status(&self) -> Result<SyncStatus> {
        let items = self.queue.list_by_priority(None)?;
        let mut by_priority = PriorityCounts::default();
        for item in &items {
            by_priority.bump(item.priority);
        }
        Ok(SyncStatus {
            total_items: items.len(),
            by_priority,
            oldest_timestamp: items.iter().map(|item| item.timestamp).min(),
            is_online: self.network.is_online(),
            is_syncing: self.is_syncing(),
        })
    }

    pub fn clear_sync_queue(&self) -> Result<()> {
        self.queue.clear()?;
        self.notifier.notify(Notification::new(
            NotificationLevel::Info,
            "Sync Queue Cleared",
            "All pending changes have been removed",
            "sync",
        ));
        Ok(())
    }

    /// Resolve conflicts for items tagged `data_type` with `handler` instead of
    /// the strategy's policy. Replaces any previous handler for that type.
    pub fn register_conflict_handler(
        &self,
        data_type: impl Into<String>,
        handler: impl ConflictHandler + 'static,
    ) {
        self.conflict_handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(data_type.into(), Arc::new(handler));
    }

    /// Deliver every finished pass to `listener` until the handle is disposed
    pub fn add_sync_listener(
        &self,
        listener: impl Fn(&SyncResult) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.listeners),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
