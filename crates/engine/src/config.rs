use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Timing knobs for one playback session. Every field falls back to its
/// default when missing from a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Interval between player polls.
    pub poll_interval_ms: u64,
    /// Per-read timeout for `current_time` and `player_state`.
    pub read_timeout_ms: u64,
    /// Per-attempt timeout for `duration`.
    pub duration_timeout_ms: u64,
    /// Delay between the seek and the play issued by a tap-to-seek.
    pub seek_settle_ms: u64,
    /// Quiet period after the last slider seek before polling resumes.
    pub seek_quiet_window_ms: u64,
    /// Offset added to a segment start when seeking to it.
    pub segment_seek_offset_ms: u64,
    /// Bound on the play-state read after a mode switch.
    pub mode_switch_state_timeout_ms: u64,
    /// Bound on creating and cueing a player.
    pub init_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 300,
            read_timeout_ms: 300,
            duration_timeout_ms: 800,
            seek_settle_ms: 300,
            seek_quiet_window_ms: 600,
            segment_seek_offset_ms: 100,
            mode_switch_state_timeout_ms: 500,
            init_timeout_ms: 10_000,
        }
    }
}

impl SessionConfig {
    /// Loads a JSON config file such as `{ "pollIntervalMs": 250 }`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&input).map_err(|source| EngineError::ConfigFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn duration_timeout(&self) -> Duration {
        Duration::from_millis(self.duration_timeout_ms)
    }

    pub fn seek_settle(&self) -> Duration {
        Duration::from_millis(self.seek_settle_ms)
    }

    pub fn seek_quiet_window(&self) -> Duration {
        Duration::from_millis(self.seek_quiet_window_ms)
    }

    pub fn mode_switch_state_timeout(&self) -> Duration {
        Duration::from_millis(self.mode_switch_state_timeout_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionConfig;

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "pollIntervalMs": 250, "seekQuietWindowMs": 900 }"#)
                .expect("config should parse");

        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.seek_quiet_window_ms, 900);
        assert_eq!(config.duration_timeout_ms, 800);
        assert_eq!(config.segment_seek_offset_ms, 100);
    }

    #[test]
    fn zero_poll_interval_is_bumped_to_one_millisecond() {
        let config = SessionConfig {
            poll_interval_ms: 0,
            ..SessionConfig::default()
        };

        assert_eq!(config.poll_interval().as_millis(), 1);
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let error = SessionConfig::from_json_file(std::path::Path::new("/nonexistent/session.json"))
            .expect_err("missing file must fail");

        assert!(error.to_string().contains("/nonexistent/session.json"));
    }
}
