//! Pure playback state transitions. The session actor drives this from
//! commands and poll samples and performs all I/O itself.

use std::sync::Arc;

use lesson_player::{PlaybackMode, PlayerState};
use tracing::debug;

use crate::api::{PlaybackSnapshot, PlaybackState, SessionPhase};
use crate::error::{EngineError, Result};
use crate::time::seconds_to_ms;
use crate::transcript::Transcript;

/// One round of reads taken from the player by the poller. Failed reads are
/// `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PollSample {
    pub position_secs: Option<f64>,
    pub player_state: Option<PlayerState>,
    pub duration_secs: Option<f64>,
}

/// Single writer of [`PlaybackState`].
#[derive(Debug, Clone, Default)]
pub struct PlaybackMachine {
    state: PlaybackState,
    transcript: Arc<Transcript>,
}

impl PlaybackMachine {
    pub fn new(mode: PlaybackMode) -> Self {
        Self {
            state: PlaybackState {
                mode,
                ..PlaybackState::default()
            },
            transcript: Arc::new(Transcript::empty()),
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn transcript(&self) -> &Arc<Transcript> {
        &self.transcript
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state.clone(),
            transcript: Arc::clone(&self.transcript),
        }
    }

    pub fn duration_known(&self) -> bool {
        self.state.duration_ms > 0
    }

    /// Resets per-lesson state and enters `Initializing`. Translation
    /// visibility and the seek counter carry over.
    pub fn begin_initialize(&mut self, transcript: Arc<Transcript>, mode: PlaybackMode) {
        self.transcript = transcript;
        self.state = PlaybackState {
            mode,
            phase: SessionPhase::Initializing,
            show_translation: self.state.show_translation,
            seek_version: self.state.seek_version,
            current_segment_index: self.transcript.resolve_exact(0),
            ..PlaybackState::default()
        };
    }

    pub fn finish_initialize(&mut self) {
        self.state.phase = SessionPhase::Ready;
        self.state.error_message = None;
    }

    /// Records an initialization or switch failure. Blocks `Ready` until the
    /// next successful initialize.
    pub fn fail(&mut self, message: String) {
        self.state.phase = SessionPhase::Error;
        self.state.is_playing = false;
        self.state.is_seeking = false;
        self.state.error_message = Some(message);
    }

    pub fn ensure_ready(&self) -> Result<()> {
        if self.state.phase != SessionPhase::Ready {
            return Err(EngineError::NotReady {
                phase: self.state.phase,
            });
        }
        Ok(())
    }

    /// Applies a poll sample. Returns true when observable state changed.
    ///
    /// Position is ignored while a seek is in flight so the optimistic seek
    /// target is not overwritten by a stale read.
    pub fn apply_sample(&mut self, sample: &PollSample) -> bool {
        if self.state.phase != SessionPhase::Ready {
            return false;
        }
        let before = self.state.clone();

        if let Some(position_secs) = sample.position_secs
            && !self.state.is_seeking
        {
            let position_ms = seconds_to_ms(position_secs);
            self.state.position_ms = position_ms;
            self.state.current_segment_index = self.transcript.resolve_exact(position_ms);
        }

        if let Some(player_state) = sample.player_state {
            self.reconcile_play_state(player_state);
        }

        if let Some(duration_secs) = sample.duration_secs
            && self.state.duration_ms == 0
        {
            let duration_ms = seconds_to_ms(duration_secs);
            if duration_ms > 0 {
                debug!(duration_ms, "media duration resolved");
                self.state.duration_ms = duration_ms;
            }
        }

        self.state != before
    }

    fn reconcile_play_state(&mut self, player_state: PlayerState) {
        if self.state.mode.has_native_controls() {
            // The user may operate the player directly.
            self.state.is_playing = player_state.is_advancing();
        } else if player_state == PlayerState::Ended {
            // Custom transport owns intent; only a natural end overrides it.
            self.state.is_playing = false;
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.state.is_playing = playing;
    }

    /// Applies an explicit slider seek optimistically and returns the clamped
    /// target in milliseconds.
    pub fn begin_seek(&mut self, seconds: f64) -> Result<u64> {
        if !seconds.is_finite() {
            return Err(EngineError::InvalidSeekTarget(seconds));
        }
        let mut target_ms = seconds_to_ms(seconds);
        if self.state.duration_ms > 0 {
            target_ms = target_ms.min(self.state.duration_ms);
        }

        self.state.is_seeking = true;
        self.state.position_ms = target_ms;
        self.state.current_segment_index = self.transcript.resolve_gap_aware(target_ms);
        self.state.seek_version += 1;
        Ok(target_ms)
    }

    /// Ends the seek quiet window; polling takes over again.
    pub fn end_seek(&mut self) -> bool {
        let was_seeking = self.state.is_seeking;
        self.state.is_seeking = false;
        was_seeking
    }

    /// Seek target for tap-to-seek on `index`: segment start plus `offset_ms`,
    /// so the landing point is not classified into the previous line.
    pub fn segment_seek_target(&self, index: usize, offset_ms: u64) -> Result<u64> {
        let segment = self
            .transcript
            .get(index)
            .ok_or(EngineError::SegmentOutOfRange {
                index,
                len: self.transcript.len(),
            })?;
        Ok(segment.start_ms + offset_ms)
    }

    /// Applies a settled tap-to-seek: position, line and playing flag.
    pub fn apply_segment_seek(&mut self, index: usize, target_ms: u64) {
        self.state.position_ms = target_ms;
        self.state.current_segment_index = Some(index);
        self.state.is_playing = true;
        self.state.seek_version += 1;
    }

    pub fn begin_switch(&mut self, mode: PlaybackMode) {
        self.state.phase = SessionPhase::Switching;
        self.state.mode = mode;
    }

    /// Completes a mode switch. `external_playing` is the authoritative read
    /// from the new player, or `None` to keep the cached flag.
    pub fn finish_switch(&mut self, external_playing: Option<bool>) {
        if let Some(playing) = external_playing {
            self.state.is_playing = playing;
        }
        self.state.phase = SessionPhase::Ready;
        self.state.error_message = None;
    }

    pub fn toggle_translation(&mut self) {
        self.state.show_translation = !self.state.show_translation;
    }

    pub fn dispose(&mut self) {
        self.state.phase = SessionPhase::Disposed;
        self.state.is_playing = false;
        self.state.is_seeking = false;
    }
}
