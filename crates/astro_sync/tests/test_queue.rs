use astro_common::{HttpMethod, Priority};
use astro_store::{Partition, RecordStore, StoreOptions};
use astro_sync::{NewQueueItem, SyncQueue};
use serde_json::json;
use std::sync::Arc;

fn queue() -> SyncQueue {
    SyncQueue::new(Arc::new(
        RecordStore::open_in_memory(StoreOptions::default()).unwrap(),
    ))
}

#[test]
fn test_list_orders_by_priority_then_enqueue_order() {
    let queue = queue();
    let low = queue
        .enqueue(NewQueueItem::new(HttpMethod::Post, "/low").with_priority(Priority::Low))
        .unwrap();
    let high_1 = queue
        .enqueue(NewQueueItem::new(HttpMethod::Post, "/high-1").with_priority(Priority::High))
        .unwrap();
    let critical = queue
        .enqueue(NewQueueItem::new(HttpMethod::Post, "/critical").with_priority(Priority::Critical))
        .unwrap();
    let high_2 = queue
        .enqueue(NewQueueItem::new(HttpMethod::Post, "/high-2").with_priority(Priority::High))
        .unwrap();
    let medium = queue
        .enqueue(NewQueueItem::new(HttpMethod::Post, "/medium").with_priority(Priority::Medium))
        .unwrap();

    let ids: Vec<String> = queue
        .list_by_priority(None)
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(ids, vec![critical, high_1.clone(), high_2.clone(), medium, low]);

    let highs: Vec<String> = queue
        .list_by_priority(Some(Priority::High))
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(highs, vec![high_1, high_2]);
}

#[test]
fn test_older_timestamp_sorts_first_within_tier() {
    let queue = queue();
    let first = queue
        .enqueue(NewQueueItem::new(HttpMethod::Put, "/a").with_priority(Priority::High))
        .unwrap();
    let second = queue
        .enqueue(NewQueueItem::new(HttpMethod::Put, "/b").with_priority(Priority::High))
        .unwrap();

    // retrying the first item keeps its place
    queue.update_retry(&first, 1).unwrap();
    let ids: Vec<String> = queue
        .list_by_priority(Some(Priority::High))
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(ids, vec![first, second]);
}

#[test]
fn test_imported_items_sort_by_timestamp() {
    let store = Arc::new(RecordStore::open_in_memory(StoreOptions::default()).unwrap());
    for (id, timestamp) in [("sync_30_ccccccccc", 30), ("sync_10_aaaaaaaaa", 10), ("sync_20_bbbbbbbbb", 20)] {
        store
            .put(
                Partition::SyncQueue,
                &json!({
                    "id": id,
                    "method": "POST",
                    "url": "/frames",
                    "timestamp": timestamp,
                    "retryCount": 0,
                    "maxRetries": 3,
                    "priority": "medium",
                }),
            )
            .unwrap();
    }

    let queue = SyncQueue::new(store);
    let ids: Vec<String> = queue
        .list_by_priority(Some(Priority::Medium))
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(
        ids,
        vec!["sync_10_aaaaaaaaa", "sync_20_bbbbbbbbb", "sync_30_ccccccccc"]
    );
}

#[test]
fn test_remove_is_idempotent() {
    let queue = queue();
    let id = queue
        .enqueue(NewQueueItem::new(HttpMethod::Delete, "/api/frames/1"))
        .unwrap();
    assert!(queue.contains(&id).unwrap());

    queue.remove(&id).unwrap();
    queue.remove(&id).unwrap();
    assert!(!queue.contains(&id).unwrap());
    assert!(queue.is_empty().unwrap());
}

#[test]
fn test_clear_empties_queue() {
    let queue = queue();
    for i in 0..3 {
        queue
            .enqueue(NewQueueItem::new(HttpMethod::Post, format!("/api/frames/{}", i)))
            .unwrap();
    }
    assert_eq!(queue.len().unwrap(), 3);
    queue.clear().unwrap();
    assert_eq!(queue.len().unwrap(), 0);
}

#[test]
fn test_queue_survives_reopen() {
    let temp = astro_test_helpers::workspace::temp_dir();
    let path = temp.path().join("offline.db");

    let id = {
        let store = Arc::new(RecordStore::open(&path, StoreOptions::default()).unwrap());
        let queue = SyncQueue::new(store.clone());
        let id = queue
            .enqueue(
                NewQueueItem::new(HttpMethod::Post, "/api/sessions")
                    .with_data(json!({"target": "M42"}))
                    .with_priority(Priority::Critical),
            )
            .unwrap();
        store.close().unwrap();
        id
    };

    let queue = SyncQueue::new(Arc::new(RecordStore::open(&path, StoreOptions::default()).unwrap()));
    let item = queue.get(&id).unwrap().unwrap();
    assert_eq!(item.url, "/api/sessions");
    assert_eq!(item.data, Some(json!({"target": "M42"})));
}
