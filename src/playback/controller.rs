use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::surface::{PlaybackFault, PlaybackMedia, PlaybackSurface};
use crate::error::{RecorderError, Result};
use crate::history::Locator;
use crate::media::{DeviceClaim, DeviceRegistry, DeviceUse};
use crate::session::Artifact;

pub const MIN_RATE: f64 = 0.25;
pub const MAX_RATE: f64 = 2.0;

/// What to play
#[derive(Debug, Clone)]
pub enum PlaybackSource {
    /// Live preview of a capture device
    Live { device: String },
    /// Catalogued media, borrowed for this call only
    Media(PlaybackMedia),
    /// A finished artifact; the controller owns a temporary locator for it
    Artifact(Artifact),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Snapshot of the player
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// Locator href or live device name
    pub source: Option<String>,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    pub rate: f64,
    pub volume: f64,
    pub muted: bool,
}

/// Notification published by the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started { source: String },
    Paused,
    Stopped,
    Fault(PlaybackFault),
    RateChanged(f64),
    VolumeChanged(f64),
    MuteChanged(bool),
}

enum Bound {
    Live { claim: DeviceClaim },
    Media { locator: Locator },
    Temporary { locator: Locator, _payload: Arc<[u8]> },
}

impl Bound {
    fn describe(&self) -> String {
        match self {
            Bound::Live { claim } => format!("live:{}", claim.device()),
            Bound::Media { locator } | Bound::Temporary { locator, .. } => {
                locator.href().to_string()
            }
        }
    }
}

/// Single-target media player
///
/// At most one source is bound at a time. Binding a new source releases the
/// previous one first: live preview claims go back to the device registry and
/// temporary locators created here are revoked.
pub struct PlaybackController {
    surface: Box<dyn PlaybackSurface>,
    devices: DeviceRegistry,
    bound: Option<Bound>,
    state: PlaybackState,
    rate: f64,
    volume: f64,
    muted: bool,
    temporaries_revoked: usize,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackController {
    pub fn new(surface: Box<dyn PlaybackSurface>, devices: DeviceRegistry) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            surface,
            devices,
            bound: None,
            state: PlaybackState::Stopped,
            rate: 1.0,
            volume: 1.0,
            muted: false,
            temporaries_revoked: 0,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Bind `source` and start playing it
    pub fn play(&mut self, source: PlaybackSource) -> Result<()> {
        match source {
            PlaybackSource::Live { device } => {
                if self.devices.holder(&device) == Some(DeviceUse::Capture) {
                    return Err(RecorderError::ResourceBusy(format!(
                        "device '{}' is being recorded",
                        device
                    )));
                }
                if self.is_previewing(&device) {
                    self.unbind();
                }
                // Claim before detaching so a busy device keeps the current source
                let claim = self.devices.claim(&device, DeviceUse::Preview)?;
                self.unbind();

                if let Err(fault) = self.surface.attach_live(&device) {
                    return Err(self.fault(fault));
                }
                self.bound = Some(Bound::Live { claim });
            }
            PlaybackSource::Media(media) => {
                self.unbind();
                if let Err(fault) = self.surface.load(&media) {
                    return Err(self.fault(fault));
                }
                self.bound = Some(Bound::Media {
                    locator: media.locator,
                });
            }
            PlaybackSource::Artifact(artifact) => {
                self.unbind();
                let media = PlaybackMedia {
                    locator: Locator::memory(),
                    payload: Some(artifact.payload().clone()),
                    mime_type: artifact.mime_type().to_string(),
                    duration_secs: artifact.duration_secs(),
                };
                if let Err(fault) = self.surface.load(&media) {
                    return Err(self.fault(fault));
                }
                self.bound = Some(Bound::Temporary {
                    locator: media.locator,
                    _payload: artifact.payload().clone(),
                });
            }
        }

        self.surface.set_rate(self.rate);
        self.surface.set_volume(self.volume);
        self.surface.set_muted(self.muted);
        if let Err(fault) = self.surface.play() {
            return Err(self.fault(fault));
        }

        let source = self.bound.as_ref().map(Bound::describe).unwrap_or_default();
        info!("Playback started: {}", source);
        self.state = PlaybackState::Playing;
        self.publish(PlaybackEvent::Started { source });
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.state != PlaybackState::Playing {
            return Err(RecorderError::invalid_transition("pause playback", self.state));
        }
        self.surface.pause();
        self.state = PlaybackState::Paused;
        self.publish(PlaybackEvent::Paused);
        Ok(())
    }

    /// Continue a paused source
    pub fn resume(&mut self) -> Result<()> {
        if self.state != PlaybackState::Paused {
            return Err(RecorderError::invalid_transition("resume playback", self.state));
        }
        if let Err(fault) = self.surface.play() {
            return Err(self.fault(fault));
        }
        self.state = PlaybackState::Playing;
        self.publish(PlaybackEvent::Started {
            source: self.bound.as_ref().map(Bound::describe).unwrap_or_default(),
        });
        Ok(())
    }

    /// Stop and release the bound source
    pub fn stop(&mut self) {
        if self.bound.is_none() && self.state == PlaybackState::Stopped {
            return;
        }
        self.surface.pause();
        self.surface.seek(0.0);
        self.unbind();
        self.state = PlaybackState::Stopped;
        info!("Playback stopped");
        self.publish(PlaybackEvent::Stopped);
    }

    /// Move to `position_secs`, clamped to the media length
    pub fn seek(&mut self, position_secs: f64) -> Result<()> {
        if !position_secs.is_finite() {
            return Err(RecorderError::InvalidParameter(format!(
                "seek position {} is not a number of seconds",
                position_secs
            )));
        }
        match &self.bound {
            None => Err(RecorderError::invalid_transition("seek", self.state)),
            Some(Bound::Live { .. }) => Err(RecorderError::InvalidParameter(
                "a live preview cannot seek".into(),
            )),
            Some(_) => {
                let duration = self.surface.duration().unwrap_or(0.0);
                self.surface.seek(position_secs.clamp(0.0, duration.max(0.0)));
                Ok(())
            }
        }
    }

    /// Set playback speed; values outside [0.25, 2.0] are rejected
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(RecorderError::InvalidParameter(format!(
                "playback rate {} outside [{}, {}]",
                rate, MIN_RATE, MAX_RATE
            )));
        }
        self.rate = rate;
        self.surface.set_rate(rate);
        self.publish(PlaybackEvent::RateChanged(rate));
        Ok(())
    }

    /// Set volume; values outside [0, 1] are rejected
    pub fn set_volume(&mut self, level: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&level) {
            return Err(RecorderError::InvalidParameter(format!(
                "volume {} outside [0, 1]",
                level
            )));
        }
        self.volume = level;
        self.surface.set_volume(level);
        self.publish(PlaybackEvent::VolumeChanged(level));
        Ok(())
    }

    pub fn mute(&mut self, muted: bool) {
        self.muted = muted;
        self.surface.set_muted(muted);
        self.publish(PlaybackEvent::MuteChanged(muted));
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            source: self.bound.as_ref().map(Bound::describe),
            position_secs: self.surface.position(),
            duration_secs: self.surface.duration(),
            rate: self.rate,
            volume: self.volume,
            muted: self.muted,
        }
    }

    /// Whether `locator` is the bound source
    pub fn is_playing_locator(&self, locator: &Locator) -> bool {
        matches!(&self.bound, Some(Bound::Media { locator: bound }) if bound == locator)
    }

    /// Whether a live preview of `device` is bound
    pub fn is_previewing(&self, device: &str) -> bool {
        matches!(&self.bound, Some(Bound::Live { claim }) if claim.device() == device)
    }

    /// Number of controller-owned temporary locators released so far
    pub fn temporaries_revoked(&self) -> usize {
        self.temporaries_revoked
    }

    fn unbind(&mut self) {
        let Some(bound) = self.bound.take() else {
            return;
        };
        self.surface.detach();
        match bound {
            Bound::Live { claim } => {
                debug!("Live preview of '{}' detached", claim.device());
            }
            Bound::Temporary { locator, .. } => {
                self.temporaries_revoked += 1;
                debug!("Temporary locator {} revoked", locator);
            }
            Bound::Media { .. } => {}
        }
    }

    fn fault(&mut self, fault: PlaybackFault) -> RecorderError {
        warn!("Playback failed: {}", fault);
        self.unbind();
        self.surface.detach();
        self.state = PlaybackState::Stopped;
        self.publish(PlaybackEvent::Fault(fault));
        RecorderError::Playback(fault)
    }

    fn publish(&self, event: PlaybackEvent) {
        let _ = self.events.send(event);
    }
}
