use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use lesson_player::PlayerError;

use crate::api::SessionPhase;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by session commands, transcript loading and configuration.
#[derive(Debug)]
pub enum EngineError {
    /// The session actor has shut down; no further commands are accepted.
    SessionClosed,
    /// The command queue is full; the command was dropped.
    SessionBusy,
    NotReady {
        phase: SessionPhase,
    },
    SegmentOutOfRange {
        index: usize,
        len: usize,
    },
    InvalidTimestamp {
        value: String,
    },
    InvalidSeekTarget(f64),
    TranscriptIo {
        path: PathBuf,
        source: std::io::Error,
    },
    TranscriptFormat {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ConfigFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
    PreferencesIo {
        path: PathBuf,
        source: std::io::Error,
    },
    PreferencesFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
    PlayerInit {
        context: &'static str,
        source: PlayerError,
    },
    InitTimeout {
        context: &'static str,
        after: Duration,
    },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionClosed => write!(f, "playback session is closed"),
            Self::SessionBusy => write!(f, "playback session command queue is full"),
            Self::NotReady { phase } => write!(f, "playback session is not ready ({phase})"),
            Self::SegmentOutOfRange { index, len } => {
                write!(f, "segment {index} out of range (transcript has {len})")
            }
            Self::InvalidTimestamp { value } => write!(f, "invalid timestamp: {value}"),
            Self::InvalidSeekTarget(seconds) => write!(f, "invalid seek target: {seconds}s"),
            Self::TranscriptIo { path, source } => {
                write!(f, "failed to read transcript {}: {source}", path.display())
            }
            Self::TranscriptFormat { path, source } => match path {
                Some(path) => write!(f, "invalid transcript {}: {source}", path.display()),
                None => write!(f, "invalid transcript: {source}"),
            },
            Self::ConfigIo { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            Self::ConfigFormat { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
            Self::PreferencesIo { path, source } => {
                write!(f, "preference store {}: {source}", path.display())
            }
            Self::PreferencesFormat { path, source } => {
                write!(f, "invalid preferences {}: {source}", path.display())
            }
            Self::PlayerInit { context, source } => write!(f, "{context}: {source}"),
            Self::InitTimeout { context, after } => {
                write!(f, "{context}: timed out after {}ms", after.as_millis())
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TranscriptIo { source, .. }
            | Self::ConfigIo { source, .. }
            | Self::PreferencesIo { source, .. } => Some(source),
            Self::TranscriptFormat { source, .. }
            | Self::ConfigFormat { source, .. }
            | Self::PreferencesFormat { source, .. } => Some(source),
            Self::PlayerInit { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use lesson_player::PlayerError;

    use super::EngineError;
    use crate::api::SessionPhase;

    #[test]
    fn player_init_message_is_user_readable() {
        let error = EngineError::PlayerInit {
            context: "failed to start video player",
            source: PlayerError::CreateFailed {
                reason: "embed disabled".to_string(),
            },
        };

        assert_eq!(
            error.to_string(),
            "failed to start video player: failed to create player: embed disabled"
        );
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn not_ready_reports_phase() {
        let error = EngineError::NotReady {
            phase: SessionPhase::Switching,
        };

        assert_eq!(error.to_string(), "playback session is not ready (switching)");
    }
}
