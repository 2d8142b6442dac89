use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{SessionCommand, SessionState};

/// Snapshot of a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub state: SessionState,

    /// When the device became ready (None before that)
    pub started_at: Option<DateTime<Utc>>,

    /// Active recording time in seconds, pauses excluded
    pub duration_secs: f64,

    /// Number of chunks buffered so far
    pub chunks_count: usize,

    /// Bytes buffered so far
    pub bytes_buffered: usize,
}

/// Notification published by a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    ChunkCaptured {
        sequence: u64,
        bytes: usize,
    },
    /// A command or event arrived in a state that does not accept it
    Rejected {
        command: SessionCommand,
        state: SessionState,
    },
    /// Transport delivered data while capture was suspended
    ChunkRejected {
        sequence: u64,
        state: SessionState,
    },
    Failed {
        message: String,
    },
    Finalized {
        artifact_id: String,
        duration_secs: f64,
        size: u64,
    },
}
