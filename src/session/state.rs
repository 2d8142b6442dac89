//! Session state machine definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created, nothing acquired yet
    #[default]
    Idle,
    /// Waiting for the device
    Acquiring,
    /// Chunks are being captured
    Recording,
    /// Capture suspended, device still held
    Paused,
    /// Draining the transport before assembly
    Stopping,
    /// Terminal: stop completed
    Finalized,
    /// Terminal: cancelled or failed
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Aborted)
    }

    /// Whether the session owns the device binding in this state
    pub fn holds_device(self) -> bool {
        matches!(
            self,
            Self::Acquiring | Self::Recording | Self::Paused | Self::Stopping
        )
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Acquiring)
            | (Acquiring, Recording)
            | (Recording, Paused)
            | (Paused, Recording)
            | (Recording, Stopping)
            | (Paused, Stopping)
            | (Stopping, Finalized) => true,
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Finalized => "finalized",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// User command addressed to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionCommand {
    Start,
    Pause,
    Resume,
    Stop,
    Abort,
}

impl fmt::Display for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Abort => "abort",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    const ALL: [SessionState; 7] = [Idle, Acquiring, Recording, Paused, Stopping, Finalized, Aborted];

    #[test]
    fn test_terminal_states_accept_nothing() {
        for next in ALL {
            assert!(!Finalized.can_transition_to(next));
            assert!(!Aborted.can_transition_to(next));
        }
    }

    #[test]
    fn test_abort_reachable_from_every_live_state() {
        for from in [Idle, Acquiring, Recording, Paused, Stopping] {
            assert!(from.can_transition_to(Aborted), "{} -> aborted", from);
        }
    }

    #[test]
    fn test_only_listed_transitions_are_allowed() {
        let allowed: Vec<(SessionState, SessionState)> = ALL
            .iter()
            .flat_map(|&from| ALL.iter().map(move |&to| (from, to)))
            .filter(|&(from, to)| from.can_transition_to(to) && to != Aborted)
            .collect();

        assert_eq!(
            allowed,
            vec![
                (Idle, Acquiring),
                (Acquiring, Recording),
                (Recording, Paused),
                (Recording, Stopping),
                (Paused, Recording),
                (Paused, Stopping),
                (Stopping, Finalized),
            ]
        );
    }

    #[test]
    fn test_device_held_only_while_live() {
        assert!(!Idle.holds_device());
        assert!(Recording.holds_device());
        assert!(Paused.holds_device());
        assert!(!Finalized.holds_device());
        assert!(!Aborted.holds_device());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Paused).unwrap(), "\"paused\"");
    }
}
