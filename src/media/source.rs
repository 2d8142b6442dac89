use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::file::FileSource;
use super::synthetic::{SyntheticConfig, SyntheticSource};

/// Container MIME type produced when nothing else is configured
pub const DEFAULT_MIME_TYPE: &str = "video/webm;codecs=vp9,opus";

/// What the caller asks of the capture device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// Capture a video track
    pub video: bool,
    /// Capture an audio track
    pub audio: bool,
    /// Requested encoder output, e.g. "video/webm;codecs=vp9,opus"
    pub mime_type: String,
    /// How often the transport delivers a chunk, in milliseconds
    pub timeslice_ms: u64,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            timeslice_ms: 1000, // One chunk per second
        }
    }
}

impl MediaConstraints {
    /// MIME type without codec parameters ("video/webm;codecs=vp9" -> "video/webm")
    pub fn container_mime(&self) -> &str {
        container_mime(&self.mime_type)
    }
}

pub fn container_mime(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

/// Binding to an acquired capture device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: Uuid,
    /// Logical device name the handle is bound to
    pub device: String,
    pub mime_type: String,
}

impl StreamHandle {
    pub fn new(device: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device: device.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Event pushed by a capture transport into the session queue
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// An encoded fragment; sequences start at 0 and never skip
    Data { sequence: u64, bytes: Vec<u8> },
    /// Emission is suspended; no data follows until resumed
    Suspended,
    /// Emission has fully drained after a stop request
    Flushed,
    /// Unrecoverable transport failure
    Failed(String),
}

/// Live media source
///
/// Implementations:
/// - Synthetic: deterministic generator (tests, demos)
/// - File: replays an existing recording as if it were live
#[async_trait::async_trait]
pub trait MediaSource: Send + Sync {
    /// Acquire the capture device
    ///
    /// Fails with `PermissionDenied` or `DeviceUnavailable`. Must not be
    /// called again before the previous handle is released.
    async fn acquire(&mut self, constraints: &MediaConstraints) -> Result<StreamHandle>;

    /// Start pushing chunks for `handle` into `events`
    async fn start_capture(
        &mut self,
        handle: &StreamHandle,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<()>;

    /// Suspend emission; the transport answers with `TransportEvent::Suspended`
    async fn pause_capture(&mut self, handle: &StreamHandle) -> Result<()>;

    /// Resume emission after a pause
    async fn resume_capture(&mut self, handle: &StreamHandle) -> Result<()>;

    /// Stop emission; the transport answers with `TransportEvent::Flushed`
    async fn stop_capture(&mut self, handle: &StreamHandle) -> Result<()>;

    /// Free device resources. Releasing twice is a no-op.
    async fn release(&mut self, handle: &StreamHandle) -> Result<()>;

    /// Whether the source can produce the given MIME type
    fn supports(&self, mime_type: &str) -> bool;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Media source type
#[derive(Debug, Clone)]
pub enum SourceKind {
    /// Generated test pattern
    Synthetic(SyntheticConfig),
    /// Existing media file replayed as a live stream
    File { device: String, path: PathBuf, chunk_bytes: usize },
}

/// Media source factory
pub struct MediaSourceFactory;

impl MediaSourceFactory {
    pub fn create(kind: SourceKind) -> Box<dyn MediaSource> {
        match kind {
            SourceKind::Synthetic(config) => Box::new(SyntheticSource::new(config)),
            SourceKind::File {
                device,
                path,
                chunk_bytes,
            } => Box::new(FileSource::new(device, path, chunk_bytes)),
        }
    }
}
