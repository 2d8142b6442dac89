use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::source::{container_mime, MediaConstraints, MediaSource, StreamHandle, TransportEvent};
use super::transport::CaptureTransport;
use crate::error::{RecorderError, Result};

/// Replays an existing media file as a live capture stream
pub struct FileSource {
    device: String,
    path: PathBuf,
    chunk_bytes: usize,
    timeslice: Duration,
    handle: Option<StreamHandle>,
    transport: Option<CaptureTransport>,
}

impl FileSource {
    pub fn new(device: impl Into<String>, path: impl Into<PathBuf>, chunk_bytes: usize) -> Self {
        Self {
            device: device.into(),
            path: path.into(),
            chunk_bytes: chunk_bytes.max(1),
            timeslice: Duration::from_secs(1),
            handle: None,
            transport: None,
        }
    }

    fn translate(&self, error: std::io::Error) -> RecorderError {
        match error.kind() {
            ErrorKind::PermissionDenied => {
                RecorderError::PermissionDenied(format!("{}: {}", self.path.display(), error))
            }
            _ => RecorderError::DeviceUnavailable(format!("{}: {}", self.path.display(), error)),
        }
    }

    fn transport(&self, handle: &StreamHandle) -> Result<&CaptureTransport> {
        match (&self.handle, &self.transport) {
            (Some(held), Some(transport)) if held.id == handle.id => Ok(transport),
            _ => Err(RecorderError::DeviceUnavailable(format!(
                "no capture running on '{}'",
                handle.device
            ))),
        }
    }
}

#[async_trait::async_trait]
impl MediaSource for FileSource {
    async fn acquire(&mut self, constraints: &MediaConstraints) -> Result<StreamHandle> {
        if self.handle.is_some() {
            return Err(RecorderError::ResourceBusy(format!(
                "'{}' is already acquired",
                self.device
            )));
        }

        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.translate(e))?;
        if !metadata.is_file() {
            return Err(RecorderError::DeviceUnavailable(format!(
                "{} is not a file",
                self.path.display()
            )));
        }

        self.timeslice = Duration::from_millis(constraints.timeslice_ms.max(1));
        let handle = StreamHandle::new(&self.device, &constraints.mime_type);
        self.handle = Some(handle.clone());

        info!(
            "File source '{}' acquired: {} ({} bytes)",
            self.device,
            self.path.display(),
            metadata.len()
        );

        Ok(handle)
    }

    async fn start_capture(
        &mut self,
        handle: &StreamHandle,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<()> {
        if self.handle.as_ref().map(|h| h.id) != Some(handle.id) {
            return Err(RecorderError::DeviceUnavailable(format!(
                "'{}' is not acquired",
                handle.device
            )));
        }
        if self.transport.is_some() {
            return Err(RecorderError::ResourceBusy("capture already running".into()));
        }

        let contents = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.translate(e))?;
        let chunk_bytes = self.chunk_bytes;

        self.transport = Some(CaptureTransport::spawn(self.timeslice, events, move |sequence| {
            let start = (sequence as usize).checked_mul(chunk_bytes)?;
            if start >= contents.len() {
                return None;
            }
            let end = (start + chunk_bytes).min(contents.len());
            Some(contents[start..end].to_vec())
        }));

        Ok(())
    }

    async fn pause_capture(&mut self, handle: &StreamHandle) -> Result<()> {
        self.transport(handle)?.suspend()
    }

    async fn resume_capture(&mut self, handle: &StreamHandle) -> Result<()> {
        self.transport(handle)?.resume()
    }

    async fn stop_capture(&mut self, handle: &StreamHandle) -> Result<()> {
        self.transport(handle)?.drain()
    }

    async fn release(&mut self, handle: &StreamHandle) -> Result<()> {
        if self.handle.as_ref().map(|h| h.id) != Some(handle.id) {
            return Ok(());
        }
        if let Some(transport) = self.transport.take() {
            transport.shutdown();
        }
        self.handle = None;
        info!("File source '{}' released", self.device);
        Ok(())
    }

    fn supports(&self, mime_type: &str) -> bool {
        let mime = container_mime(mime_type);
        mime.starts_with("video/") || mime.starts_with("audio/")
    }

    fn name(&self) -> &str {
        "file"
    }
}
