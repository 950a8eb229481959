//! End-to-end flow: activity queue -> grouping pipeline -> batch queue ->
//! delivery handler -> append log, all against in-memory backends.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use medialog_applog::{decode_log_file, file_path, index_path, AppendLogStore};
use medialog_core::MediaEvent;
use medialog_storage::{BlobStore, MemoryStorage};
use medialog_transport::MemoryTransport;
use medialog_worker::{
    DeliveryConfig, DeliveryHandler, GroupingPipeline, PipelineConfig,
};

fn activity_body(key: &str, n: u32) -> String {
    format!(
        r#"{{
            "key": "{key}",
            "timestamp": "2024-03-07T09:00:{n:02}Z",
            "operation": "ingest",
            "mediaHash": "hash-{n}",
            "contentType": "image/png",
            "user": "alice",
            "path": "photos/{n}.png"
        }}"#
    )
}

fn expected_event(n: u32) -> MediaEvent {
    MediaEvent {
        timestamp: Utc.with_ymd_and_hms(2024, 3, 7, 9, 0, n).unwrap(),
        operation: "ingest".to_string(),
        media_hash: format!("hash-{}", n),
        content_type: "image/png".to_string(),
        user: "alice".to_string(),
        path: format!("photos/{}.png", n),
        original_filename: None,
        content_source_type: None,
    }
}

async fn logged_events(storage: &MemoryStorage, key: &str) -> Vec<MediaEvent> {
    let index = String::from_utf8(storage.get(&index_path(key)).await.unwrap()).unwrap();
    let mut events = Vec::new();
    for file_id in index.lines() {
        let data = storage.get(&file_path(key, file_id)).await.unwrap();
        events.extend(decode_log_file(&data).unwrap());
    }
    events
}

#[tokio::test]
async fn activity_events_end_up_in_per_key_logs() {
    let activity_queue = Arc::new(MemoryTransport::new());
    let batch_queue = Arc::new(MemoryTransport::new());
    let storage = Arc::new(MemoryStorage::new());

    activity_queue.push(activity_body("k1", 1));
    activity_queue.push(activity_body("k2", 2));
    activity_queue.push("garbage that is not json");
    activity_queue.push(activity_body("k1", 3));

    let pipeline = GroupingPipeline::new(
        activity_queue.clone(),
        batch_queue.clone(),
        PipelineConfig::default(),
    );
    let summary = pipeline.run_once().await.unwrap();
    assert_eq!(summary.received, 4);
    assert_eq!(summary.forwarded, 2);
    assert_eq!(activity_queue.queued_len(), 0);
    assert_eq!(activity_queue.inflight_len(), 0);

    let handler = DeliveryHandler::new(
        batch_queue.clone(),
        storage.clone(),
        AppendLogStore::new(storage.clone(), medialog_applog::DEFAULT_MAX_FILE_BYTES),
        DeliveryConfig::default(),
    );
    let summary = handler.run_once().await.unwrap();
    assert_eq!(summary.received, 2);
    assert!(summary.failed_message_ids.is_empty());
    assert_eq!(batch_queue.inflight_len(), 0);

    assert_eq!(
        logged_events(&storage, "k1").await,
        vec![expected_event(1), expected_event(3)]
    );
    assert_eq!(logged_events(&storage, "k2").await, vec![expected_event(2)]);
}

#[tokio::test]
async fn second_pass_appends_to_the_same_file_below_threshold() {
    let activity_queue = Arc::new(MemoryTransport::new());
    let batch_queue = Arc::new(MemoryTransport::new());
    let storage = Arc::new(MemoryStorage::new());

    let pipeline = GroupingPipeline::new(
        activity_queue.clone(),
        batch_queue.clone(),
        PipelineConfig::default(),
    );
    let handler = DeliveryHandler::new(
        batch_queue.clone(),
        storage.clone(),
        AppendLogStore::new(storage.clone(), medialog_applog::DEFAULT_MAX_FILE_BYTES),
        DeliveryConfig::default(),
    );

    activity_queue.push(activity_body("k1", 1));
    pipeline.run_once().await.unwrap();
    handler.run_once().await.unwrap();

    activity_queue.push(activity_body("k1", 2));
    pipeline.run_once().await.unwrap();
    handler.run_once().await.unwrap();

    let index = String::from_utf8(storage.get(&index_path("k1")).await.unwrap()).unwrap();
    assert_eq!(index.lines().count(), 1);
    assert_eq!(
        logged_events(&storage, "k1").await,
        vec![expected_event(1), expected_event(2)]
    );
}
