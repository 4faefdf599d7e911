//! Connectivity tracking

use crate::notify::{Notification, NotificationLevel, NotificationSink};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 16;

/// Connectivity transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Online,
    Offline,
    /// Still online one settle delay after coming back
    Settled,
}

/// Holds the online flag and broadcasts its transitions
pub struct NetworkMonitor {
    online: watch::Sender<bool>,
    events: broadcast::Sender<NetworkEvent>,
    settle_delay: Duration,
    notifier: Arc<dyn NotificationSink>,
    settle_task: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkMonitor {
    /// `initial` is the platform's connectivity at startup
    pub fn new(initial: bool, settle_delay: Duration, notifier: Arc<dyn NotificationSink>) -> Self {
        let (online, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            online,
            events,
            settle_delay,
            notifier,
            settle_task: Mutex::new(None),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.events.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Platform connectivity callback. Repeating the current state does nothing.
    pub fn set_online(&self, online: bool) {
        let changed = self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return;
        }

        if let Some(pending) = self.lock_settle_task().take() {
            pending.abort();
        }

        if online {
            tracing::info!("Network connection restored");
            self.notifier.notify(Notification::new(
                NotificationLevel::Success,
                "Back Online",
                "Syncing pending changes...",
                "network",
            ));
            let _ = self.events.send(NetworkEvent::Online);
            self.schedule_settle();
        } else {
            tracing::warn!("Network connection lost");
            self.notifier.notify(Notification::new(
                NotificationLevel::Warning,
                "Offline Mode",
                "Changes will sync when the connection is restored",
                "network",
            ));
            let _ = self.events.send(NetworkEvent::Offline);
        }
    }

    fn schedule_settle(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; reconnect sync will not be triggered");
            return;
        };

        let online = self.online.subscribe();
        let events = self.events.clone();
        let delay = self.settle_delay;
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if *online.borrow() {
                tracing::debug!("Connection settled after {:?}", delay);
                let _ = events.send(NetworkEvent::Settled);
            }
        });
        *self.lock_settle_task() = Some(task);
    }

    fn lock_settle_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.settle_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.lock_settle_task().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::TracingNotifier;

    #[test]
    fn test_initial_state_without_runtime() {
        let monitor = NetworkMonitor::new(false, Duration::from_secs(2), Arc::new(TracingNotifier));
        assert!(!monitor.is_online());

        // outside a runtime the settle signal is skipped, the flag still flips
        monitor.set_online(true);
        assert!(monitor.is_online());
    }

    #[test]
    fn test_repeated_state_emits_nothing() {
        let monitor = NetworkMonitor::new(true, Duration::from_secs(2), Arc::new(TracingNotifier));
        let mut events = monitor.subscribe();
        monitor.set_online(true);
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
