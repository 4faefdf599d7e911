mod common;

use astro_sync::{NetworkEvent, NetworkMonitor};
use common::RecordingNotifier;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn monitor(initial: bool) -> (NetworkMonitor, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = NetworkMonitor::new(initial, Duration::from_secs(2), notifier.clone());
    (monitor, notifier)
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_settles_after_delay() {
    let (monitor, notifier) = monitor(false);
    let mut events = monitor.subscribe();

    monitor.set_online(true);
    assert!(monitor.is_online());
    assert_eq!(events.recv().await.unwrap(), NetworkEvent::Online);

    // nothing before the settle delay
    assert!(timeout(Duration::from_millis(1_900), events.recv()).await.is_err());
    assert_eq!(
        timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap(),
        NetworkEvent::Settled
    );
    assert_eq!(notifier.titles(), vec!["Back Online"]);
}

#[tokio::test(start_paused = true)]
async fn test_no_settle_when_connection_drops_again() {
    let (monitor, notifier) = monitor(false);
    let mut events = monitor.subscribe();

    monitor.set_online(true);
    monitor.set_online(false);

    assert_eq!(events.recv().await.unwrap(), NetworkEvent::Online);
    assert_eq!(events.recv().await.unwrap(), NetworkEvent::Offline);
    assert!(timeout(Duration::from_secs(10), events.recv()).await.is_err());
    assert_eq!(notifier.titles(), vec!["Back Online", "Offline Mode"]);
}

#[tokio::test(start_paused = true)]
async fn test_flapping_settles_once() {
    let (monitor, _) = monitor(true);
    let mut events = monitor.subscribe();

    monitor.set_online(false);
    monitor.set_online(true);
    tokio::time::sleep(Duration::from_secs(1)).await;
    monitor.set_online(false);
    monitor.set_online(true);

    let mut settled = 0;
    while let Ok(Ok(event)) = timeout(Duration::from_secs(5), events.recv()).await {
        if event == NetworkEvent::Settled {
            settled += 1;
        }
    }
    assert_eq!(settled, 1);
}

#[tokio::test]
async fn test_watch_tracks_flag() {
    let (monitor, notifier) = monitor(true);
    let mut watch = monitor.watch();

    monitor.set_online(true);
    assert!(notifier.titles().is_empty());

    monitor.set_online(false);
    watch.changed().await.unwrap();
    assert!(!*watch.borrow());
    assert!(!monitor.is_online());
}
