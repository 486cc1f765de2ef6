use std::fmt::{Display, Formatter};
use std::sync::Arc;

use lesson_player::PlaybackMode;

use crate::transcript::{Transcript, TranscriptSegment};

/// Commands accepted by a playback session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Starts (or restarts) a lesson: tears down any live player, creates a
    /// fresh one for `mode` and begins polling it.
    ///
    /// # Example
    /// ```ignore
    /// use std::sync::Arc;
    /// use lesson_engine::{Command, Transcript};
    /// use lesson_player::PlaybackMode;
    ///
    /// session
    ///     .send(Command::Initialize {
    ///         media_id: "y-m56nn4LeQ".to_string(),
    ///         transcript: Arc::new(Transcript::empty()),
    ///         mode: PlaybackMode::Video,
    ///     })
    ///     .await?;
    /// ```
    Initialize {
        media_id: String,
        transcript: Arc<Transcript>,
        mode: PlaybackMode,
    },
    Play,
    Pause,
    /// Slider seek to an absolute position. Bursts are debounced: polling
    /// stays suspended until the quiet window after the last request.
    Seek {
        seconds: f64,
    },
    /// Tap-to-seek onto a transcript line; playback resumes once the player
    /// has had time to settle.
    SeekToSegment {
        index: usize,
    },
    /// Recreates the player for `mode`. No-op when `mode` is already active.
    SwitchMode {
        mode: PlaybackMode,
    },
    ToggleTranslation,
    /// Stops polling, releases the player and closes the session.
    Dispose,
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Seek { .. } => "seek",
            Self::SeekToSegment { .. } => "seek_to_segment",
            Self::SwitchMode { .. } => "switch_mode",
            Self::ToggleTranslation => "toggle_translation",
            Self::Dispose => "dispose",
        }
    }
}

/// Lifecycle of a playback session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Switching,
    Error,
    Disposed,
}

impl Display for SessionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Switching => "switching",
            Self::Error => "error",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Authoritative playback view owned by the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub position_ms: u64,
    /// `0` until the player has reported a positive duration.
    pub duration_ms: u64,
    pub is_playing: bool,
    pub mode: PlaybackMode,
    pub current_segment_index: Option<usize>,
    pub is_seeking: bool,
    /// Bumped on every explicit seek; lets the list tell jumps from drift.
    pub seek_version: u64,
    pub show_translation: bool,
    pub phase: SessionPhase,
    pub error_message: Option<String>,
}

impl PlaybackState {
    pub fn is_initialized(&self) -> bool {
        self.phase == SessionPhase::Ready
    }

    /// Position clamped into `[0, duration]` once the duration is known.
    pub fn display_position_ms(&self) -> u64 {
        if self.duration_ms > 0 {
            self.position_ms.min(self.duration_ms)
        } else {
            self.position_ms
        }
    }
}

/// Immutable snapshot consumed by the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub transcript: Arc<Transcript>,
}

impl PlaybackSnapshot {
    pub fn current_segment(&self) -> Option<&TranscriptSegment> {
        self.state
            .current_segment_index
            .and_then(|index| self.transcript.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::{PlaybackState, SessionPhase};

    #[test]
    fn display_position_is_clamped_only_when_duration_is_known() {
        let mut state = PlaybackState {
            position_ms: 12_000,
            ..PlaybackState::default()
        };
        assert_eq!(state.display_position_ms(), 12_000);

        state.duration_ms = 10_000;
        assert_eq!(state.display_position_ms(), 10_000);
    }

    #[test]
    fn only_ready_counts_as_initialized() {
        let mut state = PlaybackState::default();
        assert!(!state.is_initialized());

        state.phase = SessionPhase::Ready;
        assert!(state.is_initialized());
    }
}
