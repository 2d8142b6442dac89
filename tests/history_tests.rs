// Integration tests for the recording catalog
//
// These tests verify ordering, durable write-through and that every
// playback locator is released exactly once.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use std::fs;
use stream_recorder::history::{HistoryStore, Locator, SyncStatus, CATALOG_FILE, MEDIA_DIR};
use stream_recorder::session::Artifact;
use stream_recorder::RecorderError;
use tempfile::TempDir;

fn artifact(millis: i64, payload: Vec<u8>) -> Artifact {
    let created = Utc.timestamp_millis_opt(millis).unwrap();
    Artifact::new(payload, 4.25, "video/webm;codecs=vp9,opus", created)
}

#[test]
fn test_reload_preserves_entries_and_order() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let (first, second) = {
        let mut store = HistoryStore::open(temp_dir.path())?;
        let first = store.add(&artifact(1_730_000_000_000, vec![1; 10]))?;
        let second = store.add(&artifact(1_730_000_005_000, vec![2; 20]))?;
        (first, second)
    };

    assert!(temp_dir.path().join(CATALOG_FILE).exists());

    let store = HistoryStore::open(temp_dir.path())?;
    let ids: Vec<&str> = store.list().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);

    let newest = &store.list()[0];
    assert_eq!(newest.size, 20);
    assert_eq!(newest.duration_secs, 4.25);
    assert_eq!(newest.mime_type, "video/webm");
    assert_eq!(newest.timestamp.timestamp_millis(), 1_730_000_005_000);

    // Payload bytes come back under a fresh memory locator
    assert_eq!(&store.payload(&first)?[..], &[1u8; 10][..]);
    assert!(matches!(newest.locator, Some(Locator::Memory(_))));

    Ok(())
}

#[test]
fn test_reload_keeps_order_of_many_same_millisecond_entries() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let before: Vec<String> = {
        let mut store = HistoryStore::open(temp_dir.path())?;
        for i in 0..12u8 {
            store.add(&artifact(5_000, vec![i; 3]))?;
        }
        store.list().iter().map(|e| e.id.clone()).collect()
    };
    assert_eq!(before[0], "5000-11");
    assert_eq!(before[1], "5000-10");
    assert_eq!(before[2], "5000-9");
    assert_eq!(before[11], "5000");

    let store = HistoryStore::open(temp_dir.path())?;
    let after: Vec<String> = store.list().iter().map(|e| e.id.clone()).collect();
    assert_eq!(after, before);

    Ok(())
}

#[test]
fn test_locators_are_not_persisted() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut store = HistoryStore::open(temp_dir.path())?;
    store.add(&artifact(1_000, vec![5; 4]))?;

    let catalog = fs::read_to_string(temp_dir.path().join(CATALOG_FILE))?;
    assert!(!catalog.contains("mem:"));
    assert!(catalog.contains("\"status\": \"local_only\""));

    Ok(())
}

#[test]
fn test_remove_revokes_locator_once() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut store = HistoryStore::open(temp_dir.path())?;
    let id = store.add(&artifact(2_000, vec![7; 8]))?;
    let keep = store.add(&artifact(3_000, vec![8; 8]))?;

    let locator = store.get(&id).and_then(|e| e.locator.clone()).unwrap();
    assert!(store.is_live(&locator));

    let removed = store.remove(&id)?;
    assert_eq!(removed.id, id);
    assert!(!store.is_live(&locator));
    assert_eq!(store.revocations(), 1);
    assert!(store.list().iter().all(|e| e.id != id));

    // A second remove finds nothing and revokes nothing
    assert!(matches!(store.remove(&id), Err(RecorderError::NotFound(_))));
    assert_eq!(store.revocations(), 1);

    // The removal is durable and the payload file is gone
    let reopened = HistoryStore::open(temp_dir.path())?;
    assert!(reopened.get(&id).is_none());
    assert!(reopened.get(&keep).is_some());
    assert_eq!(fs::read_dir(temp_dir.path().join(MEDIA_DIR))?.count(), 1);

    Ok(())
}

#[test]
fn test_open_media_borrows_payload() -> Result<()> {
    let mut store = HistoryStore::in_memory();
    let id = store.add(&artifact(4_000, vec![3; 12]))?;

    let media = store.open_media(&id)?;
    assert_eq!(media.payload.as_deref(), Some(&[3u8; 12][..]));
    assert_eq!(media.mime_type, "video/webm");
    assert_eq!(media.duration_secs, 4.25);

    assert!(matches!(
        store.open_media("missing"),
        Err(RecorderError::NotFound(_))
    ));

    Ok(())
}

#[test]
fn test_sync_status_round_trip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (synced, pending) = {
        let mut store = HistoryStore::open(temp_dir.path())?;
        let synced = store.add(&artifact(5_000, vec![1]))?;
        let pending = store.add(&artifact(6_000, vec![2]))?;
        store.mark_synced(&synced, "recording-5000-1", "/uploads/recording-5000-1.webm")?;
        store.mark_pending(&pending, "server unreachable")?;
        (synced, pending)
    };

    let store = HistoryStore::open(temp_dir.path())?;
    assert_eq!(
        store.get(&synced).map(|e| e.sync.clone()),
        Some(SyncStatus::Synced {
            remote_id: "recording-5000-1".into(),
            path: "/uploads/recording-5000-1.webm".into(),
        })
    );
    let pending_ids: Vec<&str> = store.pending_sync().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(pending_ids, vec![pending.as_str()]);

    Ok(())
}

#[test]
fn test_synced_entry_without_payload_uses_remote_locator() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let id = {
        let mut store = HistoryStore::open(temp_dir.path())?;
        let id = store.add(&artifact(7_000, vec![9; 3]))?;
        store.mark_synced(&id, "recording-7000-1", "/uploads/recording-7000-1.webm")?;
        id
    };
    fs::remove_file(temp_dir.path().join(MEDIA_DIR).join(format!("{}.webm", id)))?;

    let store = HistoryStore::open(temp_dir.path())?;
    let entry = store.get(&id).unwrap();
    assert_eq!(
        entry.locator,
        Some(Locator::remote("/uploads/recording-7000-1.webm"))
    );
    assert!(matches!(store.payload(&id), Err(RecorderError::NotFound(_))));

    Ok(())
}

#[test]
fn test_close_revokes_everything() -> Result<()> {
    let mut store = HistoryStore::in_memory();
    store.add(&artifact(1, vec![1]))?;
    store.add(&artifact(2, vec![2]))?;
    store.add(&artifact(3, vec![3]))?;

    assert_eq!(store.close(), 3);
    assert_eq!(store.revocations(), 3);
    assert!(store.list().iter().all(|e| e.locator.is_none()));

    Ok(())
}
