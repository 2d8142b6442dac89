use super::artifact::Artifact;
use super::chunk::ChunkBuffer;
use super::config::SessionConfig;
use super::state::{SessionCommand, SessionState};
use super::stats::{SessionEvent, SessionStats};
use crate::error::{RecorderError, Result};
use crate::media::{DeviceClaim, DeviceRegistry, DeviceUse, MediaSource, StreamHandle, TransportEvent};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Transport acknowledgement a drain waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Suspended,
    Flushed,
}

/// One recording lifecycle bound to one capture device
///
/// Every session that leaves `Idle` ends in exactly one of `Finalized` or
/// `Aborted`. Commands issued in a state that does not accept them leave the
/// state untouched and return `InvalidTransition`.
pub struct RecordingSession {
    /// Session configuration
    config: SessionConfig,

    state: SessionState,

    /// Device adapter and chunk transport
    source: Box<dyn MediaSource>,

    /// Shared device bindings; the claim is held while the device is bound
    devices: DeviceRegistry,
    claim: Option<DeviceClaim>,

    /// Acquired stream, present from Acquiring until release
    handle: Option<StreamHandle>,

    buffer: ChunkBuffer,

    /// When the device became ready
    started_at: Option<DateTime<Utc>>,

    /// Start of the current active interval (None while paused)
    active_since: Option<Instant>,

    /// Sum of closed active intervals
    active: Duration,

    /// Handed to the transport on start
    events_tx: Option<mpsc::Sender<TransportEvent>>,
    events_rx: mpsc::Receiver<TransportEvent>,

    notifier: broadcast::Sender<SessionEvent>,
}

impl RecordingSession {
    /// Create a new recording session
    pub fn new(
        config: SessionConfig,
        source: Box<dyn MediaSource>,
        devices: DeviceRegistry,
    ) -> Self {
        info!(
            "Creating recording session: {} (source: {}, device: {})",
            config.session_id,
            source.name(),
            config.device
        );

        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (notifier, _) = broadcast::channel(100);

        Self {
            config,
            state: SessionState::Idle,
            source,
            devices,
            claim: None,
            handle: None,
            buffer: ChunkBuffer::new(),
            started_at: None,
            active_since: None,
            active: Duration::ZERO,
            events_tx: Some(events_tx),
            events_rx,
            notifier,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.notifier.subscribe()
    }

    pub(crate) fn notifier(&self) -> broadcast::Sender<SessionEvent> {
        self.notifier.clone()
    }

    /// Whether chunk delivery is expected in the current state
    pub fn is_capturing(&self) -> bool {
        matches!(self.state, SessionState::Recording | SessionState::Paused)
    }

    /// Active recording time so far, pauses excluded
    pub fn duration(&self) -> Duration {
        self.active
            + self
                .active_since
                .map(|since| since.elapsed())
                .unwrap_or_default()
    }

    /// Get current session statistics
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.config.session_id.clone(),
            state: self.state,
            started_at: self.started_at,
            duration_secs: self.duration().as_secs_f64(),
            chunks_count: self.buffer.len(),
            bytes_buffered: self.buffer.byte_len(),
        }
    }

    /// Acquire the device and start capturing
    pub async fn start(&mut self) -> Result<()> {
        self.expect(SessionCommand::Start, &[SessionState::Idle])?;

        let claim = match self.devices.claim(&self.config.device, DeviceUse::Capture) {
            Ok(claim) => claim,
            Err(e) => {
                warn!("Session {} cannot start: {}", self.config.session_id, e);
                self.publish(SessionEvent::Failed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        self.claim = Some(claim);
        self.transition(SessionState::Acquiring);

        if !self.source.supports(&self.config.constraints.mime_type) {
            let err = RecorderError::DeviceUnavailable(format!(
                "{} cannot record {}",
                self.source.name(),
                self.config.constraints.mime_type
            ));
            return self.fail(err).await;
        }

        let limit = self.config.acquire_timeout;
        let handle = match timeout(limit, self.source.acquire(&self.config.constraints)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return self.fail(e).await,
            Err(_) => return self.fail(RecorderError::DeviceTimeout(limit)).await,
        };
        self.handle = Some(handle.clone());

        let Some(events) = self.events_tx.take() else {
            return self
                .fail(RecorderError::DeviceUnavailable(
                    "event channel already handed out".into(),
                ))
                .await;
        };
        if let Err(e) = self.source.start_capture(&handle, events).await {
            return self.fail(e).await;
        }

        self.started_at = Some(Utc::now());
        self.active_since = Some(Instant::now());
        self.transition(SessionState::Recording);

        Ok(())
    }

    /// Suspend capture; the device stays bound
    pub async fn pause(&mut self) -> Result<()> {
        self.expect(SessionCommand::Pause, &[SessionState::Recording])?;
        let handle = self.bound_handle()?;

        self.close_interval();
        if let Err(e) = self.source.pause_capture(&handle).await {
            return self.fail(e).await;
        }
        // Chunks captured before the suspension still belong to the recording
        if let Err(e) = self.drain_until(Marker::Suspended).await {
            return self.fail(e).await;
        }

        self.transition(SessionState::Paused);
        Ok(())
    }

    /// Resume capture after a pause
    pub async fn resume(&mut self) -> Result<()> {
        self.expect(SessionCommand::Resume, &[SessionState::Paused])?;
        let handle = self.bound_handle()?;

        if let Err(e) = self.source.resume_capture(&handle).await {
            return self.fail(e).await;
        }

        self.active_since = Some(Instant::now());
        self.transition(SessionState::Recording);
        Ok(())
    }

    /// Drain the transport, release the device and build the artifact
    ///
    /// A session that captured nothing ends `Finalized` with
    /// `EmptyRecording` and no artifact.
    pub async fn stop(&mut self) -> Result<Artifact> {
        self.expect(
            SessionCommand::Stop,
            &[SessionState::Recording, SessionState::Paused],
        )?;
        let handle = self.bound_handle()?;

        self.close_interval();
        self.transition(SessionState::Stopping);

        if let Err(e) = self.source.stop_capture(&handle).await {
            return self.fail(e).await;
        }
        if let Err(e) = self.drain_until(Marker::Flushed).await {
            return self.fail(e).await;
        }
        self.release_device().await;

        let duration_secs = self.active.as_secs_f64();
        let payload = match self.buffer.assemble() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    "Session {} finalized without an artifact: {}",
                    self.config.session_id, e
                );
                self.publish(SessionEvent::Failed {
                    message: e.to_string(),
                });
                self.transition(SessionState::Finalized);
                return Err(e);
            }
        };

        let artifact = Artifact::new(
            payload,
            duration_secs,
            &self.config.constraints.mime_type,
            Utc::now(),
        );

        info!(
            "Session {} finalized: artifact {} ({:.1}s, {} bytes)",
            self.config.session_id,
            artifact.id(),
            artifact.duration_secs(),
            artifact.size()
        );

        self.transition(SessionState::Finalized);
        self.publish(SessionEvent::Finalized {
            artifact_id: artifact.id().to_string(),
            duration_secs: artifact.duration_secs(),
            size: artifact.size(),
        });

        Ok(artifact)
    }

    /// Cancel the session, discarding everything captured
    pub async fn abort(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.reject(SessionCommand::Abort));
        }

        info!(
            "Aborting session {} while {}",
            self.config.session_id, self.state
        );
        self.discard().await;
        self.transition(SessionState::Aborted);

        Ok(())
    }

    /// Wait for the next transport event
    pub async fn next_transport_event(&mut self) -> Option<TransportEvent> {
        self.events_rx.recv().await
    }

    /// Process every transport event already queued, without waiting
    pub async fn pump(&mut self) -> Result<usize> {
        let mut processed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.on_transport_event(event).await?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Apply a transport event received outside of a drain
    pub async fn on_transport_event(&mut self, event: TransportEvent) -> Result<()> {
        match (event, self.state) {
            (TransportEvent::Data { sequence, bytes }, SessionState::Recording) => {
                if let Err(e) = self.accept_chunk(sequence, bytes) {
                    return self.fail(e).await;
                }
                Ok(())
            }
            (TransportEvent::Data { sequence, .. }, state) => {
                warn!(
                    "Session {}: chunk {} delivered while {}, not buffered",
                    self.config.session_id, sequence, state
                );
                self.publish(SessionEvent::ChunkRejected { sequence, state });
                Ok(())
            }
            (TransportEvent::Failed(message), state) if !state.is_terminal() => {
                self.fail(RecorderError::DeviceUnavailable(message)).await
            }
            (event, state) => {
                debug!("Ignoring transport event {:?} while {}", event, state);
                Ok(())
            }
        }
    }

    /// The transport went away without being asked to
    pub async fn transport_closed(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.fail(RecorderError::DeviceUnavailable(
            "capture transport closed unexpectedly".into(),
        ))
        .await
    }

    fn accept_chunk(&mut self, sequence: u64, bytes: Vec<u8>) -> Result<()> {
        let len = bytes.len();
        self.buffer.append(bytes, sequence)?;
        self.publish(SessionEvent::ChunkCaptured {
            sequence,
            bytes: len,
        });
        Ok(())
    }

    async fn drain_until(&mut self, marker: Marker) -> Result<()> {
        let limit = self.config.flush_timeout;
        let deadline = Instant::now() + limit;

        loop {
            let event = match timeout_at(deadline, self.events_rx.recv()).await {
                Err(_) => return Err(RecorderError::DeviceTimeout(limit)),
                Ok(None) => {
                    return Err(RecorderError::DeviceUnavailable(
                        "capture transport closed before draining".into(),
                    ))
                }
                Ok(Some(event)) => event,
            };

            match event {
                TransportEvent::Data { sequence, bytes } => self.accept_chunk(sequence, bytes)?,
                TransportEvent::Suspended if marker == Marker::Suspended => return Ok(()),
                TransportEvent::Flushed if marker == Marker::Flushed => return Ok(()),
                TransportEvent::Suspended => debug!("Stale suspend acknowledgement"),
                TransportEvent::Flushed => {
                    return Err(RecorderError::DeviceUnavailable(
                        "capture transport stopped unexpectedly".into(),
                    ))
                }
                TransportEvent::Failed(message) => {
                    return Err(RecorderError::DeviceUnavailable(message))
                }
            }
        }
    }

    fn bound_handle(&self) -> Result<StreamHandle> {
        self.handle
            .clone()
            .ok_or_else(|| RecorderError::DeviceUnavailable("no device bound".into()))
    }

    fn close_interval(&mut self) {
        if let Some(since) = self.active_since.take() {
            self.active += since.elapsed();
        }
    }

    async fn release_device(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.source.release(&handle).await {
                warn!("Failed to release device '{}': {}", handle.device, e);
            }
        }
        self.claim = None;
    }

    async fn discard(&mut self) {
        self.release_device().await;
        self.buffer.clear();
        self.active_since = None;
    }

    async fn fail<T>(&mut self, err: RecorderError) -> Result<T> {
        error!(
            "Session {} failed while {}: {}",
            self.config.session_id, self.state, err
        );
        self.publish(SessionEvent::Failed {
            message: err.to_string(),
        });
        self.discard().await;
        if self.state.can_transition_to(SessionState::Aborted) {
            self.transition(SessionState::Aborted);
        }
        Err(err)
    }

    fn expect(&self, command: SessionCommand, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.reject(command))
        }
    }

    fn reject(&self, command: SessionCommand) -> RecorderError {
        warn!(
            "Session {}: {} rejected while {}",
            self.config.session_id, command, self.state
        );
        self.publish(SessionEvent::Rejected {
            command,
            state: self.state,
        });
        RecorderError::invalid_transition(command, self.state)
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        debug_assert!(from.can_transition_to(to), "{} -> {}", from, to);
        self.state = to;
        info!("Session {}: {} -> {}", self.config.session_id, from, to);
        self.publish(SessionEvent::StateChanged { from, to });
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.notifier.send(event);
    }
}
