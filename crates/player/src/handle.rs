use std::fmt::{Display, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How a lesson is presented: full video with native controls, or audio-only
/// with the app's own transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    #[default]
    Video,
    Audio,
}

impl PlaybackMode {
    /// Video shows the player's own transport controls; audio hides them
    /// behind the app's transport.
    pub fn has_native_controls(self) -> bool {
        self == Self::Video
    }

    /// Returns the other mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::Video => Self::Audio,
            Self::Audio => Self::Video,
        }
    }
}

impl Display for PlaybackMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Transport state reported by the external player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlayerState {
    #[default]
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
}

impl PlayerState {
    /// Playing or buffering: media is expected to advance.
    pub fn is_advancing(self) -> bool {
        matches!(self, Self::Playing | Self::Buffering)
    }
}

/// Creation parameters for one player handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub media_id: String,
    pub mode: PlaybackMode,
}

impl PlayerConfig {
    pub fn new(media_id: impl Into<String>, mode: PlaybackMode) -> Self {
        Self {
            media_id: media_id.into(),
            mode,
        }
    }
}

/// Capability exposed by an external media player.
///
/// Every call may be slow or fail transiently; callers are expected to wrap
/// reads in timeouts and treat failures as "try again later".
#[async_trait]
pub trait PlayerHandle: Send + Sync {
    /// Loads `media_id` without starting playback.
    async fn cue(&self, media_id: &str) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Seeks to `seconds`. `allow_seek_ahead` lets the player request data
    /// beyond what is buffered.
    async fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> Result<()>;

    /// Current media position in seconds.
    async fn current_time(&self) -> Result<f64>;

    /// Media duration in seconds. Unavailable until metadata has loaded.
    async fn duration(&self) -> Result<f64>;

    async fn player_state(&self) -> Result<PlayerState>;

    /// Releases underlying resources. Later calls should fail with
    /// [`crate::PlayerError::Released`].
    async fn release(&self) {}
}

/// Creates player handles; one handle per playback mode activation.
pub trait PlayerFactory: Send + Sync {
    fn create(&self, config: &PlayerConfig) -> Result<Arc<dyn PlayerHandle>>;
}

#[cfg(test)]
mod tests {
    use super::{PlaybackMode, PlayerState};

    #[test]
    fn controls_are_native_only_in_video_mode() {
        assert!(PlaybackMode::Video.has_native_controls());
        assert!(!PlaybackMode::Audio.has_native_controls());
    }

    #[test]
    fn buffering_counts_as_advancing() {
        assert!(PlayerState::Buffering.is_advancing());
        assert!(PlayerState::Playing.is_advancing());
        assert!(!PlayerState::Ended.is_advancing());
        assert!(!PlayerState::Unstarted.is_advancing());
    }

    #[test]
    fn playback_mode_serializes_lowercase() {
        assert_eq!(PlaybackMode::default(), PlaybackMode::Video);
        assert_eq!(PlaybackMode::Audio.toggled(), PlaybackMode::Video);
        assert_eq!(PlaybackMode::Audio.to_string(), "audio");
    }
}
