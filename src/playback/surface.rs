use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::history::Locator;
use crate::media::container_mime;

/// Closed taxonomy of playback transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackFault {
    /// Loading was cancelled
    Aborted,
    /// Streaming a remote locator failed
    Network,
    /// The payload could not be decoded
    Decode,
    /// The format or source is not supported
    Unsupported,
}

impl PlaybackFault {
    /// Map a numeric media error code (1..=4) to a fault
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Aborted),
            2 => Some(Self::Network),
            3 => Some(Self::Decode),
            4 => Some(Self::Unsupported),
            _ => None,
        }
    }
}

impl fmt::Display for PlaybackFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::Aborted => "Video loading aborted",
            Self::Network => "Network error occurred",
            Self::Decode => "Video decoding failed",
            Self::Unsupported => "Video not supported",
        };
        f.write_str(message)
    }
}

/// Media handed to the player for a single `play` call
#[derive(Debug, Clone)]
pub struct PlaybackMedia {
    pub locator: Locator,
    /// In-memory bytes; None for remote locators that are streamed
    pub payload: Option<Arc<[u8]>>,
    pub mime_type: String,
    pub duration_secs: f64,
}

/// Rendering target driven by the playback controller
pub trait PlaybackSurface: Send {
    /// Bind a live capture device as preview
    fn attach_live(&mut self, device: &str) -> Result<(), PlaybackFault>;

    /// Load finished media
    fn load(&mut self, media: &PlaybackMedia) -> Result<(), PlaybackFault>;

    fn play(&mut self) -> Result<(), PlaybackFault>;

    fn pause(&mut self);

    /// Stop live tracks and drop loaded media
    fn detach(&mut self);

    fn seek(&mut self, position_secs: f64);

    fn position(&self) -> f64;

    /// Known media length; None for live sources
    fn duration(&self) -> Option<f64>;

    fn set_rate(&mut self, rate: f64);

    fn set_volume(&mut self, level: f64);

    fn set_muted(&mut self, muted: bool);
}

#[derive(Debug, Clone, PartialEq)]
enum Loaded {
    Nothing,
    Live(String),
    Media { href: String, duration: f64 },
}

/// Surface that renders nothing
///
/// Validates what it is given and keeps transport state, for servers and
/// tests. Faults can be injected for the next load or play.
#[derive(Debug)]
pub struct HeadlessSurface {
    loaded: Loaded,
    playing: bool,
    position: f64,
    rate: f64,
    volume: f64,
    muted: bool,
    injected: Option<PlaybackFault>,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self {
            loaded: Loaded::Nothing,
            playing: false,
            position: 0.0,
            rate: 1.0,
            volume: 1.0,
            muted: false,
            injected: None,
        }
    }
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next load or play with `fault`
    pub fn inject_fault(&mut self, fault: PlaybackFault) {
        self.injected = Some(fault);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn take_injected(&mut self) -> Result<(), PlaybackFault> {
        match self.injected.take() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}

impl PlaybackSurface for HeadlessSurface {
    fn attach_live(&mut self, device: &str) -> Result<(), PlaybackFault> {
        self.take_injected()?;
        self.loaded = Loaded::Live(device.to_string());
        self.position = 0.0;
        Ok(())
    }

    fn load(&mut self, media: &PlaybackMedia) -> Result<(), PlaybackFault> {
        self.take_injected()?;

        let mime = container_mime(&media.mime_type);
        if !(mime.starts_with("video/") || mime.starts_with("audio/")) {
            return Err(PlaybackFault::Unsupported);
        }
        match (&media.payload, &media.locator) {
            (Some(payload), _) if payload.is_empty() => return Err(PlaybackFault::Decode),
            (None, Locator::Memory(_)) => return Err(PlaybackFault::Aborted),
            _ => {}
        }

        debug!("Headless surface loaded {}", media.locator);
        self.loaded = Loaded::Media {
            href: media.locator.href().to_string(),
            duration: media.duration_secs,
        };
        self.position = 0.0;
        self.playing = false;
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlaybackFault> {
        self.take_injected()?;
        if self.loaded == Loaded::Nothing {
            return Err(PlaybackFault::Aborted);
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn detach(&mut self) {
        self.loaded = Loaded::Nothing;
        self.playing = false;
        self.position = 0.0;
    }

    fn seek(&mut self, position_secs: f64) {
        self.position = position_secs;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> Option<f64> {
        match &self.loaded {
            Loaded::Media { duration, .. } => Some(*duration),
            _ => None,
        }
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn set_volume(&mut self, level: f64) {
        self.volume = level;
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
}
