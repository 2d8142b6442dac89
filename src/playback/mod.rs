//! Playback of live previews and finished recordings

mod controller;
mod surface;

pub use controller::{
    PlaybackController, PlaybackEvent, PlaybackSource, PlaybackState, PlaybackStatus, MAX_RATE,
    MIN_RATE,
};
pub use surface::{HeadlessSurface, PlaybackFault, PlaybackMedia, PlaybackSurface};
