use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::media::MediaConstraints;

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-1f0c...")
    pub session_id: String,

    /// Logical capture device; at most one session may hold it
    pub device: String,

    /// Constraints passed to the media source on acquire
    pub constraints: MediaConstraints,

    /// Upper bound on device acquisition
    pub acquire_timeout: Duration,

    /// Upper bound on waiting for the transport to acknowledge pause/stop
    pub flush_timeout: Duration,

    /// Capacity of the transport event queue
    pub event_capacity: usize,
}

impl SessionConfig {
    /// Same settings under a fresh session id
    pub fn renewed(&self) -> Self {
        Self {
            session_id: new_session_id(),
            ..self.clone()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: new_session_id(),
            device: "default".to_string(),
            constraints: MediaConstraints::default(),
            acquire_timeout: Duration::from_secs(10),
            flush_timeout: Duration::from_secs(5),
            event_capacity: 64,
        }
    }
}

fn new_session_id() -> String {
    format!("session-{}", uuid::Uuid::new_v4())
}
