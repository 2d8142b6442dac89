// Integration tests for the studio coordinator
//
// These run on real time with a short timeslice so the upload server can be
// exercised over a socket.

use anyhow::Result;
use std::time::Duration;
use stream_recorder::history::{HistoryStore, SyncStatus};
use stream_recorder::http::{create_router, AppState, UploadStore};
use stream_recorder::media::{DeviceUse, MediaConstraints, SourceKind, SyntheticConfig};
use stream_recorder::playback::PlaybackState;
use stream_recorder::remote::UploadClient;
use stream_recorder::session::{SessionConfig, SessionState};
use stream_recorder::studio::{Notice, NoticeLevel, Studio};
use stream_recorder::RecorderError;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::sleep;

const DEVICE: &str = "studio-camera";

fn studio(history: HistoryStore) -> Studio {
    let session_config = SessionConfig {
        device: DEVICE.to_string(),
        constraints: MediaConstraints {
            timeslice_ms: 50,
            ..MediaConstraints::default()
        },
        ..SessionConfig::default()
    };
    let source = SourceKind::Synthetic(SyntheticConfig {
        device: DEVICE.to_string(),
        chunk_bytes: 128,
        failure: None,
    });
    Studio::new(session_config, source, history)
}

fn drain(notices: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut seen = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        seen.push(notice);
    }
    seen
}

async fn record(studio: &mut Studio) -> Result<String> {
    studio.start_recording().await?;
    sleep(Duration::from_millis(180)).await;
    Ok(studio.stop_recording().await?)
}

#[tokio::test]
async fn test_recording_lands_in_history() -> Result<()> {
    let mut studio = studio(HistoryStore::in_memory());
    let mut notices = studio.subscribe();

    let id = record(&mut studio).await?;

    let entry = studio.history().get(&id).cloned().unwrap();
    assert!(entry.size > 0);
    assert_eq!(entry.size % 128, 0);
    assert_eq!(entry.sync, SyncStatus::LocalOnly);
    assert!(studio.recording_stats().await.is_none());
    assert_eq!(studio.devices().holder(DEVICE), None);

    let messages: Vec<String> = drain(&mut notices).into_iter().map(|n| n.message).collect();
    assert!(messages.contains(&"Recording started".to_string()));
    assert!(messages.contains(&"Recording added to history".to_string()));

    studio.play_entry(&id)?;
    assert_eq!(studio.playback().state(), PlaybackState::Playing);

    Ok(())
}

#[tokio::test]
async fn test_second_start_is_rejected() -> Result<()> {
    let mut studio = studio(HistoryStore::in_memory());
    let mut notices = studio.subscribe();

    studio.start_recording().await?;
    let err = studio.start_recording().await.unwrap_err();
    assert!(matches!(err, RecorderError::InvalidTransition { .. }));
    assert!(drain(&mut notices)
        .iter()
        .any(|n| n.level == NoticeLevel::Error));

    studio.abort_recording().await?;
    assert_eq!(studio.devices().holder(DEVICE), None);

    Ok(())
}

#[tokio::test]
async fn test_commands_without_session_are_rejected() {
    let mut studio = studio(HistoryStore::in_memory());

    for result in [
        studio.pause_recording().await,
        studio.resume_recording().await,
        studio.abort_recording().await,
    ] {
        assert!(matches!(result, Err(RecorderError::InvalidTransition { .. })));
    }
    assert!(matches!(
        studio.stop_recording().await,
        Err(RecorderError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_recording_takes_over_live_preview() -> Result<()> {
    let mut studio = studio(HistoryStore::in_memory());

    studio.preview_live()?;
    assert_eq!(studio.devices().holder(DEVICE), Some(DeviceUse::Preview));

    studio.start_recording().await?;
    assert_eq!(studio.devices().holder(DEVICE), Some(DeviceUse::Capture));
    assert_eq!(studio.playback().state(), PlaybackState::Stopped);

    // And preview is refused while recording
    assert!(matches!(
        studio.preview_live(),
        Err(RecorderError::ResourceBusy(_))
    ));

    studio.pause_recording().await?;
    studio.resume_recording().await?;
    sleep(Duration::from_millis(120)).await;
    studio.stop_recording().await?;

    Ok(())
}

#[tokio::test]
async fn test_deleting_playing_entry_stops_playback() -> Result<()> {
    let mut studio = studio(HistoryStore::in_memory());
    let id = record(&mut studio).await?;

    studio.play_entry(&id)?;
    let removed = studio.delete_entry(&id).await?;

    assert_eq!(removed.id, id);
    assert_eq!(studio.playback().state(), PlaybackState::Stopped);
    assert!(studio.history().get(&id).is_none());
    assert_eq!(studio.history().revocations(), 1);

    assert!(matches!(
        studio.delete_entry(&id).await,
        Err(RecorderError::NotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_failed_upload_is_pending_until_synced() -> Result<()> {
    let temp_dir = TempDir::new()?;
    // A regular file where the uploads directory should be makes storing fail
    let uploads_dir = temp_dir.path().join("uploads");
    std::fs::write(&uploads_dir, b"not a directory")?;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_router(AppState::new(UploadStore::new(&uploads_dir, 1024 * 1024)));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let mut studio = studio(HistoryStore::open(temp_dir.path().join("history"))?)
        .with_remote(UploadClient::new(format!("http://{}", addr)));

    let id = record(&mut studio).await?;
    assert!(matches!(
        studio.history().get(&id).map(|e| &e.sync),
        Some(SyncStatus::PendingSync { .. })
    ));

    std::fs::remove_file(&uploads_dir)?;
    assert_eq!(studio.sync_pending().await?, 1);

    let entry = studio.history().get(&id).cloned().unwrap();
    match entry.sync {
        SyncStatus::Synced { remote_id, path } => {
            assert!(remote_id.starts_with("recording-"));
            assert!(uploads_dir.join(path.trim_start_matches("/uploads/")).exists());
        }
        other => panic!("expected synced entry, got {:?}", other),
    }

    // Deleting locally also deletes the remote copy
    studio.delete_entry(&id).await?;
    assert_eq!(std::fs::read_dir(&uploads_dir)?.count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_export_writes_download_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut studio = studio(HistoryStore::in_memory());
    let id = record(&mut studio).await?;

    let path = studio.export_entry(&id, temp_dir.path())?;
    let name = path.file_name().and_then(|n| n.to_str()).unwrap().to_string();

    assert!(name.starts_with("recording-"));
    assert!(name.ends_with(".webm"));
    assert!(!name.contains(':'));
    assert_eq!(
        std::fs::read(&path)?.len() as u64,
        studio.history().get(&id).unwrap().size
    );

    Ok(())
}

#[tokio::test]
async fn test_shutdown_discards_recording_in_progress() -> Result<()> {
    let mut studio = studio(HistoryStore::in_memory());
    let id = record(&mut studio).await?;
    let mut notices = studio.subscribe();

    studio.start_recording().await?;
    sleep(Duration::from_millis(60)).await;
    studio.shutdown().await;

    assert_eq!(studio.devices().holder(DEVICE), None);
    assert!(studio.recording_stats().await.is_none());
    assert_eq!(studio.history().revocations(), 1);
    assert!(studio.history().get(&id).is_some());
    assert!(drain(&mut notices)
        .iter()
        .any(|n| n.message == "Recording in progress was discarded"));

    Ok(())
}

#[tokio::test]
async fn test_stats_reflect_active_session() -> Result<()> {
    let mut studio = studio(HistoryStore::in_memory());
    studio.start_recording().await?;
    let stats = studio.recording_stats().await.unwrap();
    assert_eq!(stats.state, SessionState::Recording);
    studio.abort_recording().await?;
    Ok(())
}
