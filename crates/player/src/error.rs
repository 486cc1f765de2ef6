use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Error type for external player handles.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// The handle exists but cannot answer yet (metadata not loaded, iframe
    /// still booting, ...). Expected while a lesson starts up.
    NotReady,
    /// The handle was released and must not be used any more.
    Released,
    CreateFailed {
        reason: String,
    },
    CommandFailed {
        command: &'static str,
        reason: String,
    },
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    InvalidSeekTarget(f64),
}

impl Display for PlayerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady => write!(f, "player is not ready"),
            Self::Released => write!(f, "player handle was released"),
            Self::CreateFailed { reason } => write!(f, "failed to create player: {reason}"),
            Self::CommandFailed { command, reason } => {
                write!(f, "player command `{command}` failed: {reason}")
            }
            Self::Timeout { operation, after } => {
                write!(f, "player {operation} timed out after {}ms", after.as_millis())
            }
            Self::InvalidSeekTarget(seconds) => write!(f, "invalid seek target: {seconds}s"),
        }
    }
}

impl std::error::Error for PlayerError {}

impl PlayerError {
    /// Returns true for failures that are expected to clear up on their own
    /// and should be retried on the next poll.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotReady | Self::Timeout { .. })
    }
}
