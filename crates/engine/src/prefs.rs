use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use lesson_player::PlaybackMode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, Result};

/// Persists the user's preferred playback mode between lessons.
pub trait PreferenceStore: Send + Sync {
    /// Stored mode, or `Video` when nothing was saved.
    fn playback_mode(&self) -> PlaybackMode;

    fn set_playback_mode(&self, mode: PlaybackMode) -> Result<()>;
}

/// Process-local store, mainly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    mode: Mutex<Option<PlaybackMode>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn playback_mode(&self) -> PlaybackMode {
        self.mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or_default()
    }

    fn set_playback_mode(&self, mode: PlaybackMode) -> Result<()> {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = Some(mode);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PreferencesFile {
    playback_mode: PlaybackMode,
}

/// Store backed by a small JSON file.
#[derive(Debug, Clone)]
pub struct JsonFilePreferences {
    path: PathBuf,
}

impl JsonFilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<PreferencesFile> {
        let input = match std::fs::read_to_string(&self.path) {
            Ok(input) => input,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PreferencesFile::default());
            }
            Err(source) => {
                return Err(EngineError::PreferencesIo {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&input).map_err(|source| EngineError::PreferencesFormat {
            path: self.path.clone(),
            source,
        })
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn playback_mode(&self) -> PlaybackMode {
        match self.read() {
            Ok(file) => file.playback_mode,
            Err(error) => {
                warn!(%error, "falling back to default playback mode");
                PlaybackMode::default()
            }
        }
    }

    fn set_playback_mode(&self, mode: PlaybackMode) -> Result<()> {
        let file = PreferencesFile {
            playback_mode: mode,
        };
        let output = serde_json::to_string_pretty(&file).map_err(|source| {
            EngineError::PreferencesFormat {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, output).map_err(|source| EngineError::PreferencesIo {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use lesson_player::PlaybackMode;

    use super::{JsonFilePreferences, MemoryPreferences, PreferenceStore};

    fn temp_prefs_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "lesson-prefs-{tag}-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system clock must be after unix epoch")
                .as_nanos()
        ))
    }

    #[test]
    fn memory_store_defaults_to_video() {
        let prefs = MemoryPreferences::new();
        assert_eq!(prefs.playback_mode(), PlaybackMode::Video);

        prefs
            .set_playback_mode(PlaybackMode::Audio)
            .expect("set should succeed");
        assert_eq!(prefs.playback_mode(), PlaybackMode::Audio);
    }

    #[test]
    fn file_store_round_trips_mode() {
        let path = temp_prefs_path("roundtrip");
        let prefs = JsonFilePreferences::new(&path);
        assert_eq!(prefs.playback_mode(), PlaybackMode::Video);

        prefs
            .set_playback_mode(PlaybackMode::Audio)
            .expect("write should succeed");

        assert_eq!(
            JsonFilePreferences::new(&path).playback_mode(),
            PlaybackMode::Audio
        );
        let written = std::fs::read_to_string(&path).expect("file should exist");
        assert!(written.contains(r#""playbackMode": "audio""#));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_falls_back_to_video() {
        let path = temp_prefs_path("corrupt");
        std::fs::write(&path, "not json").expect("write fixture");

        assert_eq!(
            JsonFilePreferences::new(&path).playback_mode(),
            PlaybackMode::Video
        );
        let _ = std::fs::remove_file(path);
    }
}
