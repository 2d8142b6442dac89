// Studio coordinator
//
// Owns the single recording slot, the player and the catalog, routes user
// commands to them and reports the outcome of each command as a Notice.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::{RecorderError, Result};
use crate::history::{HistoryEntry, HistoryStore, SyncStatus};
use crate::media::{DeviceRegistry, MediaSource, MediaSourceFactory, SourceKind};
use crate::playback::{
    HeadlessSurface, PlaybackController, PlaybackSource, PlaybackSurface,
};
use crate::remote::UploadClient;
use crate::session::{
    download_name, write_download, Artifact, RecordingSession, SessionConfig, SessionHandle,
    SessionStats,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-facing status message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

pub struct Studio {
    /// Template for every new session
    session_config: SessionConfig,
    source: SourceKind,
    devices: DeviceRegistry,
    session: Option<SessionHandle>,
    playback: PlaybackController,
    history: HistoryStore,
    remote: Option<UploadClient>,
    notices: broadcast::Sender<Notice>,
}

impl Studio {
    pub fn new(session_config: SessionConfig, source: SourceKind, history: HistoryStore) -> Self {
        let devices = DeviceRegistry::new();
        let playback =
            PlaybackController::new(Box::new(HeadlessSurface::new()), devices.clone());
        let (notices, _) = broadcast::channel(100);

        Self {
            session_config,
            source,
            devices,
            session: None,
            playback,
            history,
            remote: None,
            notices,
        }
    }

    /// Upload finished recordings through `client`
    pub fn with_remote(mut self, client: UploadClient) -> Self {
        self.remote = Some(client);
        self
    }

    /// Render playback on `surface` instead of headless
    pub fn with_surface(mut self, surface: Box<dyn PlaybackSurface>) -> Self {
        self.playback = PlaybackController::new(surface, self.devices.clone());
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn playback(&mut self) -> &mut PlaybackController {
        &mut self.playback
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Start recording from the configured source
    pub async fn start_recording(&mut self) -> Result<()> {
        let source = MediaSourceFactory::create(self.source.clone());
        self.start_recording_with(source).await
    }

    /// Start recording from `source`
    pub async fn start_recording_with(&mut self, source: Box<dyn MediaSource>) -> Result<()> {
        if let Some(stats) = self.recording_stats().await {
            if !stats.state.is_terminal() {
                return Err(self.failed(
                    "Failed to start recording",
                    RecorderError::invalid_transition("start", stats.state),
                ));
            }
        }
        self.session = None;

        let device = self.session_config.device.clone();
        if self.playback.is_previewing(&device) {
            info!("Stopping live preview of '{}' before recording", device);
            self.playback.stop();
        }

        let session =
            RecordingSession::new(self.session_config.renewed(), source, self.devices.clone());
        let handle = SessionHandle::spawn(session);
        if let Err(e) = handle.start().await {
            return Err(self.failed("Failed to start recording", e));
        }

        self.session = Some(handle);
        self.notify(NoticeLevel::Success, "Recording started");
        Ok(())
    }

    pub async fn pause_recording(&mut self) -> Result<()> {
        let handle = self.active("pause")?;
        match handle.pause().await {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Recording paused");
                Ok(())
            }
            Err(e) => Err(self.failed("Failed to pause recording", e)),
        }
    }

    pub async fn resume_recording(&mut self) -> Result<()> {
        let handle = self.active("resume")?;
        match handle.resume().await {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Recording resumed");
                Ok(())
            }
            Err(e) => Err(self.failed("Failed to resume recording", e)),
        }
    }

    /// Finish the recording, catalog it and upload it when configured
    ///
    /// Returns the new history entry id.
    pub async fn stop_recording(&mut self) -> Result<String> {
        let handle = self.active("stop")?;
        let artifact = match handle.stop().await {
            Ok(artifact) => artifact,
            Err(e) => {
                self.session = None;
                return Err(self.failed("Failed to stop recording", e));
            }
        };
        self.session = None;
        self.notify(NoticeLevel::Success, "Recording stopped");

        let id = match self.history.add(&artifact) {
            Ok(id) => id,
            Err(e) => return Err(self.failed("Failed to save recording history", e)),
        };
        self.notify(NoticeLevel::Success, "Recording added to history");

        if self.remote.is_some() {
            self.upload(&id, &artifact.file_name(), artifact.mime_type(), artifact.payload().to_vec())
                .await;
        }
        Ok(id)
    }

    pub async fn abort_recording(&mut self) -> Result<()> {
        let handle = self.active("abort")?;
        let result = handle.abort().await;
        self.session = None;
        match result {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Recording discarded");
                Ok(())
            }
            Err(e) => Err(self.failed("Failed to abort recording", e)),
        }
    }

    /// Stats of the current session, if any
    pub async fn recording_stats(&self) -> Option<SessionStats> {
        match &self.session {
            Some(handle) => handle.stats().await.ok(),
            None => None,
        }
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    pub fn preview_live(&mut self) -> Result<()> {
        let device = self.session_config.device.clone();
        match self.playback.play(PlaybackSource::Live { device }) {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Live preview started");
                Ok(())
            }
            Err(e) => Err(self.failed("Failed to start live preview", e)),
        }
    }

    pub fn play_entry(&mut self, id: &str) -> Result<()> {
        let media = match self.history.open_media(id) {
            Ok(media) => media,
            Err(e) => return Err(self.failed("Failed to load recording", e)),
        };
        match self.playback.play(PlaybackSource::Media(media)) {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Playing recording");
                Ok(())
            }
            Err(e) => Err(self.failed("Failed to load recording", e)),
        }
    }

    pub fn play_artifact(&mut self, artifact: Artifact) -> Result<()> {
        match self.playback.play(PlaybackSource::Artifact(artifact)) {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Playing recording");
                Ok(())
            }
            Err(e) => Err(self.failed("Failed to load recording", e)),
        }
    }

    pub fn stop_playback(&mut self) {
        self.playback.stop();
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Delete an entry, stopping its playback first
    pub async fn delete_entry(&mut self, id: &str) -> Result<HistoryEntry> {
        let locator = match self.history.get(id) {
            Some(entry) => entry.locator.clone(),
            None => {
                return Err(self.failed(
                    "Failed to delete recording",
                    RecorderError::NotFound(format!("recording {}", id)),
                ))
            }
        };
        if locator
            .as_ref()
            .is_some_and(|locator| self.playback.is_playing_locator(locator))
        {
            self.playback.stop();
        }

        let entry = match self.history.remove(id) {
            Ok(entry) => entry,
            Err(e) => return Err(self.failed("Failed to delete recording", e)),
        };

        if let (SyncStatus::Synced { remote_id, .. }, Some(client)) = (&entry.sync, &self.remote) {
            if let Err(e) = client.delete(remote_id).await {
                warn!("Remote copy of {} not deleted: {}", id, e);
                self.notify(
                    NoticeLevel::Error,
                    format!("Remote copy was not deleted: {}", e),
                );
            }
        }

        self.notify(NoticeLevel::Success, "Recording deleted");
        Ok(entry)
    }

    /// Retry uploads that failed earlier; returns how many succeeded
    pub async fn sync_pending(&mut self) -> Result<usize> {
        if self.remote.is_none() {
            return Err(RecorderError::InvalidParameter(
                "remote persistence is not configured".into(),
            ));
        }

        let pending: Vec<HistoryEntry> = self.history.pending_sync().into_iter().cloned().collect();
        let mut synced = 0;
        for entry in pending {
            let payload = match self.history.payload(&entry.id) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Skipping sync of {}: {}", entry.id, e);
                    continue;
                }
            };
            if self
                .upload(&entry.id, &export_name(&entry), &entry.mime_type, payload.to_vec())
                .await
            {
                synced += 1;
            }
        }

        info!("Synced {} pending recordings", synced);
        Ok(synced)
    }

    /// Write an entry's bytes into `dir` as `recording-<timestamp>.<ext>`
    pub fn export_entry(&self, id: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let entry = self
            .history
            .get(id)
            .ok_or_else(|| RecorderError::NotFound(format!("recording {}", id)))?;
        let payload = self.history.payload(id)?;

        let path = write_download(dir.as_ref(), &export_name(entry), &payload)?;

        info!("Exported {} to {}", id, path.display());
        self.notify(NoticeLevel::Success, "Recording downloaded");
        Ok(path)
    }

    /// Abort any unfinished recording, stop playback and revoke every locator
    pub async fn shutdown(&mut self) {
        if let Some(stats) = self.recording_stats().await {
            if !stats.state.is_terminal() {
                warn!("Shutting down while {}, recording is discarded", stats.state);
                self.notify(
                    NoticeLevel::Error,
                    "Recording in progress was discarded",
                );
                if let Some(handle) = self.session.take() {
                    let _ = handle.abort().await;
                }
            }
        }
        self.session = None;
        self.playback.stop();
        let released = self.history.close();
        info!("Studio shut down ({} locators revoked)", released);
    }

    fn active(&self, command: &str) -> Result<SessionHandle> {
        self.session
            .clone()
            .ok_or_else(|| RecorderError::invalid_transition(command, "idle"))
    }

    /// Upload bytes for entry `id` and record the outcome
    async fn upload(&mut self, id: &str, file_name: &str, mime_type: &str, bytes: Vec<u8>) -> bool {
        let Some(client) = self.remote.clone() else {
            return false;
        };

        match client.upload(file_name, mime_type, bytes).await {
            Ok(file) => {
                if let Err(e) = self.history.mark_synced(id, &file.id, &file.path) {
                    warn!("Uploaded {} but could not record it: {}", id, e);
                }
                self.notify(NoticeLevel::Success, "Recording uploaded");
                true
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", id, e);
                if let Err(e) = self.history.mark_pending(id, &e.to_string()) {
                    warn!("Could not mark {} pending: {}", id, e);
                }
                self.notify(NoticeLevel::Error, format!("Upload failed: {}", e));
                false
            }
        }
    }

    fn failed(&self, context: &str, error: RecorderError) -> RecorderError {
        warn!("{}: {}", context, error);
        self.notify(NoticeLevel::Error, format!("{}: {}", context, error));
        error
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.notices.send(Notice {
            level,
            message: message.into(),
        });
    }
}

/// Download name of a catalogued recording
fn export_name(entry: &HistoryEntry) -> String {
    download_name(entry.timestamp, entry.extension())
}
