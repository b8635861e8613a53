//! Tests for the resume store (use in-memory DB helper from db).

use std::collections::HashMap;

use crate::engine::TransferStatus;
use crate::resume_store::db::open_memory;
use crate::resume_store::{
    EpisodeRef, JobDescriptor, KvDb, QueuedResumeRecord, ResumeStore, KEY_RESUME_PACKAGES,
};

fn descriptor(id: i64) -> JobDescriptor {
    JobDescriptor {
        id,
        episode: EpisodeRef {
            parent_id: 100,
            name: Some(format!("show {id}")),
            season: Some(1),
            episode: Some(id as u32),
        },
        source_url: format!("https://example.com/ep{id}.mp4"),
        destination_path: format!("/tmp/ep{id}.mp4"),
        headers: HashMap::new(),
        bytes_transferred: 0,
        total_bytes: None,
        status: TransferStatus::Waiting,
    }
}

#[tokio::test]
async fn active_record_roundtrip() {
    let store = ResumeStore::new(open_memory().await.unwrap());
    assert!(store.load_active(7).await.unwrap().is_none());

    let mut d = descriptor(7);
    d.bytes_transferred = 4096;
    d.total_bytes = Some(65536);
    d.status = TransferStatus::Active;
    d.headers.insert("Referer".into(), "https://example.com".into());
    store.save_active(&d).await.unwrap();

    let loaded = store.load_active(7).await.unwrap().expect("record exists");
    assert_eq!(loaded, d);

    store.remove_active(7).await.unwrap();
    assert!(store.load_active(7).await.unwrap().is_none());
}

#[tokio::test]
async fn save_active_overwrites_checkpoint() {
    let store = ResumeStore::new(open_memory().await.unwrap());
    let mut d = descriptor(3);
    store.save_active(&d).await.unwrap();
    d.bytes_transferred = 9000;
    store.save_active(&d).await.unwrap();

    let loaded = store.load_all_active().await.unwrap();
    assert_eq!(loaded.records.len(), 1);
    assert_eq!(loaded.records[0].bytes_transferred, 9000);
}

#[tokio::test]
async fn queue_list_roundtrip_preserves_order() {
    let store = ResumeStore::new(open_memory().await.unwrap());
    assert!(store.load_queue().await.unwrap().records.is_empty());

    let records: Vec<QueuedResumeRecord> = (1..=3)
        .map(|i| QueuedResumeRecord {
            descriptor: descriptor(i),
            index: i as u32,
        })
        .collect();
    store.save_queue(&records).await.unwrap();

    let loaded = store.load_queue().await.unwrap();
    assert_eq!(loaded.skipped, 0);
    let ids: Vec<i64> = loaded.records.iter().map(|r| r.descriptor.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn corrupt_active_record_is_skipped_not_fatal() {
    let db = open_memory().await.unwrap();
    let store = ResumeStore::new(db.clone());
    store.save_active(&descriptor(1)).await.unwrap();
    store.save_active(&descriptor(2)).await.unwrap();
    db.set(KEY_RESUME_PACKAGES, "999", "{not json").await.unwrap();

    let loaded = store.load_all_active().await.unwrap();
    assert_eq!(loaded.records.len(), 2);
    assert_eq!(loaded.skipped, 1);
}

#[tokio::test]
async fn corrupt_queue_element_is_skipped_not_fatal() {
    let store = ResumeStore::new(open_memory().await.unwrap());
    let good = QueuedResumeRecord {
        descriptor: descriptor(1),
        index: 1,
    };
    // Hand-build a list with a garbage element in the middle.
    let json = format!(
        "[{},{},{}]",
        serde_json::to_string(&good).unwrap(),
        r#"{"bogus":true}"#,
        serde_json::to_string(&QueuedResumeRecord {
            descriptor: descriptor(2),
            index: 2,
        })
        .unwrap()
    );
    store
        .db()
        .set(crate::resume_store::KEY_RESUME_QUEUE, "queue", &json)
        .await
        .unwrap();

    let loaded = store.load_queue().await.unwrap();
    assert_eq!(loaded.skipped, 1);
    let ids: Vec<i64> = loaded.records.iter().map(|r| r.descriptor.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn remove_all_clears_both_shapes() {
    let store = ResumeStore::new(open_memory().await.unwrap());
    store.save_active(&descriptor(5)).await.unwrap();
    store
        .save_queue(&[
            QueuedResumeRecord {
                descriptor: descriptor(5),
                index: 1,
            },
            QueuedResumeRecord {
                descriptor: descriptor(6),
                index: 2,
            },
        ])
        .await
        .unwrap();

    store.remove_all(5).await.unwrap();
    assert!(store.load_active(5).await.unwrap().is_none());
    let queue = store.load_queue().await.unwrap();
    assert_eq!(queue.records.len(), 1);
    assert_eq!(queue.records[0].descriptor.id, 6);
}

#[tokio::test]
async fn open_at_persists_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state").join("resume.db");

    let store = ResumeStore::new(KvDb::open_at(&path).await.unwrap());
    store.save_active(&descriptor(42)).await.unwrap();
    drop(store);

    let store = ResumeStore::new(KvDb::open_at(&path).await.unwrap());
    let loaded = store.load_active(42).await.unwrap().expect("survives reopen");
    assert_eq!(loaded.id, 42);
}
