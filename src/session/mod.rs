//! Recording session management
//!
//! This module provides the `RecordingSession` state machine that manages:
//! - Device acquisition and release through a `MediaSource`
//! - Ordered chunk buffering while recording
//! - Pause/resume with paused time excluded from the duration
//! - Finalizing buffered chunks into a single `Artifact`

mod artifact;
mod chunk;
mod config;
mod handle;
mod session;
mod state;
mod stats;

pub use artifact::{download_name, write_download, Artifact};
pub use chunk::{Chunk, ChunkBuffer};
pub use config::SessionConfig;
pub use handle::SessionHandle;
pub use session::RecordingSession;
pub use state::{SessionCommand, SessionState};
pub use stats::{SessionEvent, SessionStats};
