//! Live media sources
//!
//! A [`MediaSource`] owns a capture device and its chunk transport. The
//! transport pushes [`TransportEvent`]s into a channel owned by the recording
//! session; see `session` for how those events are consumed.

pub mod device;
pub mod file;
pub mod source;
pub mod synthetic;
mod transport;

pub use device::{DeviceClaim, DeviceRegistry, DeviceUse};
pub use file::FileSource;
pub use source::{
    container_mime, MediaConstraints, MediaSource, MediaSourceFactory, SourceKind, StreamHandle,
    TransportEvent, DEFAULT_MIME_TYPE,
};
pub use synthetic::{SyntheticConfig, SyntheticFailure, SyntheticProbe, SyntheticSource};
