// Synthetic capture device
//
// Produces a deterministic byte pattern at the requested timeslice. Used by
// the `record` demo command and by the test-suite, which can also make it
// fail the way a real device would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::source::{container_mime, MediaConstraints, MediaSource, StreamHandle, TransportEvent};
use super::transport::CaptureTransport;
use crate::error::{RecorderError, Result};

/// How a synthetic device should misbehave on acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFailure {
    /// User declined the permission prompt
    PermissionDenied,
    /// No such device
    Unavailable,
    /// Acquisition never completes
    Hang,
}

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub device: String,
    /// Size of every generated chunk
    pub chunk_bytes: usize,
    pub failure: Option<SyntheticFailure>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            device: "synthetic-camera".to_string(),
            chunk_bytes: 4096,
            failure: None,
        }
    }
}

/// Acquire/release counters, shared with the source
#[derive(Debug, Clone, Default)]
pub struct SyntheticProbe {
    acquisitions: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl SyntheticProbe {
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    timeslice: Duration,
    handle: Option<StreamHandle>,
    transport: Option<CaptureTransport>,
    probe: SyntheticProbe,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            timeslice: Duration::from_secs(1),
            handle: None,
            transport: None,
            probe: SyntheticProbe::default(),
        }
    }

    pub fn probe(&self) -> SyntheticProbe {
        self.probe.clone()
    }

    /// Bytes of the chunk with the given sequence number
    pub fn chunk_payload(sequence: u64, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| ((sequence as usize * 31 + i) % 256) as u8)
            .collect()
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
impl MediaSource for SyntheticSource {
    async fn acquire(&mut self, constraints: &MediaConstraints) -> Result<StreamHandle> {
        if self.handle.is_some() {
            return Err(RecorderError::ResourceBusy(format!(
                "'{}' is already acquired",
                self.config.device
            )));
        }

        match self.config.failure {
            Some(SyntheticFailure::PermissionDenied) => {
                return Err(RecorderError::PermissionDenied(format!(
                    "access to '{}' was denied",
                    self.config.device
                )))
            }
            Some(SyntheticFailure::Unavailable) => {
                return Err(RecorderError::DeviceUnavailable(format!(
                    "'{}' is not connected",
                    self.config.device
                )))
            }
            Some(SyntheticFailure::Hang) => std::future::pending::<()>().await,
            None => {}
        }

        if !self.supports(&constraints.mime_type) {
            return Err(RecorderError::DeviceUnavailable(format!(
                "'{}' cannot produce {}",
                self.config.device, constraints.mime_type
            )));
        }

        self.timeslice = Duration::from_millis(constraints.timeslice_ms.max(1));
        let handle = StreamHandle::new(&self.config.device, &constraints.mime_type);
        self.handle = Some(handle.clone());
        self.probe.acquisitions.fetch_add(1, Ordering::SeqCst);

        info!(
            "Synthetic device '{}' acquired ({}ms chunks of {} bytes)",
            self.config.device,
            self.timeslice.as_millis(),
            self.config.chunk_bytes
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

        let chunk_bytes = self.config.chunk_bytes;
        self.transport = Some(CaptureTransport::spawn(self.timeslice, events, move |sequence| {
            Some(Self::chunk_payload(sequence, chunk_bytes))
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
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
        info!("Synthetic device '{}' released", self.config.device);

        Ok(())
    }

    fn supports(&self, mime_type: &str) -> bool {
        let mime = container_mime(mime_type);
        mime.starts_with("video/") || mime.starts_with("audio/")
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
