//! Fakes and fixtures shared by the sync integration tests

#![allow(dead_code)]

use astro_common::HttpMethod;
use astro_store::{RecordStore, StoreOptions};
use astro_sync::{
    ApiClient, ApiRequest, ApiResponse, NetworkMonitor, Notification, NotificationSink,
    SyncConfig, SyncCoordinator, SyncError, SyncQueue,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A request as seen by [`MockApi`]
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub retries: u32,
}

/// Scripted API: answers from a queue of responses, then with the fallback
pub struct MockApi {
    script: Mutex<VecDeque<Result<ApiResponse, String>>>,
    fallback: Mutex<ApiResponse>,
    calls: Mutex<Vec<Call>>,
    delay: Option<Duration>,
}

impl MockApi {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::with_fallback(ApiResponse::ok(None)))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::with_fallback(ApiResponse::failed(500, "HTTP 500")))
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::with_fallback(ApiResponse::ok(None))
        })
    }

    fn with_fallback(fallback: ApiResponse) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Answer the next call with `response`
    pub fn push(&self, response: ApiResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    /// Fail the next call at the transport level
    pub fn push_transport_error(&self, message: &str) {
        self.script.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn set_fallback(&self, response: ApiResponse) {
        *self.fallback.lock().unwrap() = response;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }
}

#[async_trait]
impl ApiClient for MockApi {
    async fn request(&self, url: &str, request: ApiRequest) -> Result<ApiResponse, SyncError> {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            method: request.method,
            body: request.body.clone(),
            retries: request.retries,
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(SyncError::Request(message)),
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }
}

/// Keeps every notification for inspection
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

/// Config without backoff so consecutive passes retry straight away
pub fn test_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.strategies = config.strategies.with_retry_delay(Duration::ZERO);
    config.settle_delay = Duration::from_millis(20);
    config
}

pub struct Harness {
    pub store: Arc<RecordStore>,
    pub coordinator: Arc<SyncCoordinator>,
    pub api: Arc<MockApi>,
    pub queue: SyncQueue,
    pub network: Arc<NetworkMonitor>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness(api: Arc<MockApi>, online: bool) -> Harness {
    harness_with(api, online, test_config())
}

pub fn harness_with(api: Arc<MockApi>, online: bool, config: SyncConfig) -> Harness {
    let store = Arc::new(RecordStore::open_in_memory(StoreOptions::default()).unwrap());
    harness_on(store, api, online, config)
}

/// Harness over an existing store, e.g. a file-backed one
pub fn harness_on(
    store: Arc<RecordStore>,
    api: Arc<MockApi>,
    online: bool,
    config: SyncConfig,
) -> Harness {
    let queue = SyncQueue::new(store.clone());
    let notifier = Arc::new(RecordingNotifier::default());
    let network = Arc::new(NetworkMonitor::new(
        online,
        config.settle_delay,
        notifier.clone(),
    ));
    let coordinator = Arc::new(SyncCoordinator::new(
        queue.clone(),
        api.clone(),
        network.clone(),
        notifier.clone(),
        config,
    ));
    Harness {
        store,
        coordinator,
        api,
        queue,
        network,
        notifier,
    }
}

/// Poll `check` every 10ms for up to two seconds
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
