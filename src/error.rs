//! Error taxonomy
//!
//! Every failure that crosses a component boundary is translated into
//! [`RecorderError`]. Raw platform, transport and I/O errors never reach the
//! session state machine directly.

use crate::playback::PlaybackFault;
use std::time::Duration;
use thiserror::Error;

/// Closed set of failures reported by the recorder core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecorderError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Device did not respond within {0:?}")]
    DeviceTimeout(Duration),

    #[error("Out of order chunk: expected sequence {expected}, got {got}")]
    OutOfOrderChunk { expected: u64, got: u64 },

    #[error("Recording is empty: no chunks were captured")]
    EmptyRecording,

    #[error("Chunk buffer was already assembled")]
    AlreadyAssembled,

    #[error("Cannot {command} while {state}")]
    InvalidTransition { command: String, state: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    #[error("Playback error: {0}")]
    Playback(PlaybackFault),

    #[error("Recording session has shut down")]
    SessionClosed,
}

impl RecorderError {
    pub fn invalid_transition(command: impl ToString, state: impl ToString) -> Self {
        Self::InvalidTransition {
            command: command.to_string(),
            state: state.to_string(),
        }
    }

    /// Whether the user can reasonably retry the failed operation by hand
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::DeviceUnavailable(_)
                | Self::DeviceTimeout(_)
                | Self::ResourceBusy(_)
                | Self::StorageIo(_)
        )
    }
}

impl From<std::io::Error> for RecorderError {
    fn from(error: std::io::Error) -> Self {
        Self::StorageIo(error.to_string())
    }
}

impl From<serde_json::Error> for RecorderError {
    fn from(error: serde_json::Error) -> Self {
        Self::StorageIo(format!("catalog serialization failed: {}", error))
    }
}

impl From<tempfile::PersistError> for RecorderError {
    fn from(error: tempfile::PersistError) -> Self {
        Self::StorageIo(format!("failed to replace file: {}", error.error))
    }
}

/// Result type alias using RecorderError
pub type Result<T> = std::result::Result<T, RecorderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = RecorderError::invalid_transition("pause", "idle");
        assert_eq!(err.to_string(), "Cannot pause while idle");
    }

    #[test]
    fn test_io_errors_become_storage_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: RecorderError = io.into();
        assert!(matches!(err, RecorderError::StorageIo(ref m) if m.contains("disk full")));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_contract_errors_are_not_retryable() {
        assert!(!RecorderError::EmptyRecording.is_retryable());
        assert!(!RecorderError::AlreadyAssembled.is_retryable());
        assert!(!RecorderError::OutOfOrderChunk { expected: 1, got: 3 }.is_retryable());
    }
}
