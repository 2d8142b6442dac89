// Timed chunk emitter shared by the built-in media sources
//
// The emitter runs as its own task and is steered through a watch channel.
// Every mode change is acknowledged in-band on the event channel, so the
// session sees `Suspended` / `Flushed` strictly after the last data chunk
// produced in the previous mode.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::source::TransportEvent;
use crate::error::{RecorderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Running,
    Suspended,
    Draining,
}

pub(crate) struct CaptureTransport {
    control: watch::Sender<Mode>,
    task: JoinHandle<()>,
}

impl CaptureTransport {
    /// Spawn an emitter that calls `produce(sequence)` once per `timeslice`
    ///
    /// `produce` returning `None` means the input is exhausted; the emitter
    /// then idles until it is stopped.
    pub(crate) fn spawn<F>(
        timeslice: Duration,
        events: mpsc::Sender<TransportEvent>,
        produce: F,
    ) -> Self
    where
        F: FnMut(u64) -> Option<Vec<u8>> + Send + 'static,
    {
        let (control, control_rx) = watch::channel(Mode::Running);
        let task = tokio::spawn(emit(timeslice, control_rx, events, produce));
        Self { control, task }
    }

    pub(crate) fn suspend(&self) -> Result<()> {
        self.set(Mode::Suspended)
    }

    pub(crate) fn resume(&self) -> Result<()> {
        self.set(Mode::Running)
    }

    pub(crate) fn drain(&self) -> Result<()> {
        self.set(Mode::Draining)
    }

    pub(crate) fn shutdown(self) {
        self.task.abort();
    }

    fn set(&self, mode: Mode) -> Result<()> {
        self.control
            .send(mode)
            .map_err(|_| RecorderError::DeviceUnavailable("capture transport has exited".into()))
    }
}

async fn emit<F>(
    timeslice: Duration,
    mut control: watch::Receiver<Mode>,
    events: mpsc::Sender<TransportEvent>,
    mut produce: F,
) where
    F: FnMut(u64) -> Option<Vec<u8>>,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + timeslice, timeslice);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence = 0u64;
    let mut exhausted = false;

    loop {
        let mode = *control.borrow_and_update();
        match mode {
            Mode::Running if !exhausted => {
                tokio::select! {
                    _ = ticker.tick() => {
                        match produce(sequence) {
                            Some(bytes) => {
                                if events.send(TransportEvent::Data { sequence, bytes }).await.is_err() {
                                    return;
                                }
                                sequence += 1;
                            }
                            None => {
                                debug!("Capture input exhausted after {} chunks", sequence);
                                exhausted = true;
                            }
                        }
                    }
                    changed = control.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
            Mode::Running => {
                if control.changed().await.is_err() {
                    return;
                }
            }
            Mode::Suspended => {
                if events.send(TransportEvent::Suspended).await.is_err() {
                    return;
                }
                if control.changed().await.is_err() {
                    return;
                }
                // A resumed interval starts a full timeslice from now
                ticker.reset();
            }
            Mode::Draining => {
                let _ = events.send(TransportEvent::Flushed).await;
                return;
            }
        }
    }
}
