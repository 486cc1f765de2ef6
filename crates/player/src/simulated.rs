//! Clock-driven stand-in for a real media player.
//!
//! Position advances with [`tokio::time::Instant`], so tests running under a
//! paused runtime get fully deterministic playback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{PlayerError, Result};
use crate::handle::{PlayerConfig, PlayerFactory, PlayerHandle, PlayerState};

/// Media characteristics reproduced by a [`SimulatedPlayer`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedMedia {
    pub duration_secs: f64,
    /// Reads fail with `NotReady` until this much time has passed since creation.
    pub startup_delay: Duration,
    /// `duration()` fails with `NotReady` until this much time has passed.
    pub metadata_delay: Duration,
    /// `seek_to` takes this long before the new position is applied.
    pub seek_latency: Duration,
}

impl SimulatedMedia {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            startup_delay: Duration::ZERO,
            metadata_delay: Duration::ZERO,
            seek_latency: Duration::ZERO,
        }
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn with_metadata_delay(mut self, delay: Duration) -> Self {
        self.metadata_delay = delay;
        self
    }

    pub fn with_seek_latency(mut self, latency: Duration) -> Self {
        self.seek_latency = latency;
        self
    }
}

/// One call received by a simulated player, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Cue(String),
    Play,
    Pause,
    SeekTo { seconds: f64, allow_seek_ahead: bool },
    Release,
}

#[derive(Debug)]
struct Inner {
    state: PlayerState,
    anchor_secs: f64,
    anchor_at: Instant,
    released: bool,
    calls: Vec<(Instant, PlayerCall)>,
}

/// In-process player with a virtual transport.
#[derive(Debug)]
pub struct SimulatedPlayer {
    config: PlayerConfig,
    media: SimulatedMedia,
    created_at: Instant,
    current_time_reads: AtomicUsize,
    duration_reads: AtomicUsize,
    inner: Mutex<Inner>,
}

impl SimulatedPlayer {
    pub fn new(config: PlayerConfig, media: SimulatedMedia) -> Self {
        let now = Instant::now();
        Self {
            config,
            media,
            created_at: now,
            current_time_reads: AtomicUsize::new(0),
            duration_reads: AtomicUsize::new(0),
            inner: Mutex::new(Inner {
                state: PlayerState::Unstarted,
                anchor_secs: 0.0,
                anchor_at: now,
                released: false,
                calls: Vec::new(),
            }),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Number of `current_time()` calls received so far.
    pub fn current_time_reads(&self) -> usize {
        self.current_time_reads.load(Ordering::SeqCst)
    }

    /// Number of `duration()` calls received so far.
    pub fn duration_reads(&self) -> usize {
        self.duration_reads.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.lock().calls.iter().map(|(_, call)| call.clone()).collect()
    }

    /// Calls paired with the time elapsed since the handle was created.
    pub fn timed_calls(&self) -> Vec<(Duration, PlayerCall)> {
        self.lock()
            .calls
            .iter()
            .map(|(at, call)| (at.duration_since(self.created_at), call.clone()))
            .collect()
    }

    /// Moves the reported position without recording a call, as if the
    /// player drifted or answered with stale data.
    pub fn inject_position(&self, seconds: f64) {
        let mut inner = self.lock();
        inner.anchor_secs = seconds.max(0.0);
        inner.anchor_at = Instant::now();
    }

    /// Changes the transport state as if the user operated native controls.
    pub fn set_external_state(&self, state: PlayerState) {
        let now = Instant::now();
        let mut inner = self.lock();
        let position = self.position_locked(&mut inner, now);
        inner.anchor_secs = position;
        inner.anchor_at = now;
        inner.state = state;
    }

    /// Current virtual position, without counting as a read.
    pub fn position_secs(&self) -> f64 {
        let mut inner = self.lock();
        self.position_locked(&mut inner, Instant::now())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, inner: &mut Inner, call: PlayerCall) {
        inner.calls.push((Instant::now(), call));
    }

    fn position_locked(&self, inner: &mut Inner, now: Instant) -> f64 {
        if inner.state != PlayerState::Playing {
            return inner.anchor_secs;
        }

        let elapsed = now.duration_since(inner.anchor_at).as_secs_f64();
        let position = inner.anchor_secs + elapsed;
        if position >= self.media.duration_secs {
            inner.state = PlayerState::Ended;
            inner.anchor_secs = self.media.duration_secs;
            inner.anchor_at = now;
            return self.media.duration_secs;
        }
        position
    }

    fn ensure_live(&self, inner: &Inner) -> Result<()> {
        if inner.released {
            return Err(PlayerError::Released);
        }
        Ok(())
    }

    fn ensure_started(&self, now: Instant) -> Result<()> {
        if now.duration_since(self.created_at) < self.media.startup_delay {
            return Err(PlayerError::NotReady);
        }
        Ok(())
    }
}

#[async_trait]
impl PlayerHandle for SimulatedPlayer {
    async fn cue(&self, media_id: &str) -> Result<()> {
        let mut inner = self.lock();
        self.ensure_live(&inner)?;
        self.record(&mut inner, PlayerCall::Cue(media_id.to_string()));
        inner.state = PlayerState::Unstarted;
        inner.anchor_secs = 0.0;
        inner.anchor_at = Instant::now();
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let now = Instant::now();
        let mut inner = self.lock();
        self.ensure_live(&inner)?;
        self.record(&mut inner, PlayerCall::Play);
        let position = self.position_locked(&mut inner, now);
        if position >= self.media.duration_secs {
            return Ok(());
        }
        inner.anchor_secs = position;
        inner.anchor_at = now;
        inner.state = PlayerState::Playing;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let now = Instant::now();
        let mut inner = self.lock();
        self.ensure_live(&inner)?;
        self.record(&mut inner, PlayerCall::Pause);
        let position = self.position_locked(&mut inner, now);
        inner.anchor_secs = position;
        inner.anchor_at = now;
        if inner.state != PlayerState::Ended {
            inner.state = PlayerState::Paused;
        }
        Ok(())
    }

    async fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> Result<()> {
        if !seconds.is_finite() {
            return Err(PlayerError::InvalidSeekTarget(seconds));
        }
        if !self.media.seek_latency.is_zero() {
            tokio::time::sleep(self.media.seek_latency).await;
        }
        let mut inner = self.lock();
        self.ensure_live(&inner)?;
        self.record(
            &mut inner,
            PlayerCall::SeekTo {
                seconds,
                allow_seek_ahead,
            },
        );
        inner.anchor_secs = seconds.clamp(0.0, self.media.duration_secs);
        inner.anchor_at = Instant::now();
        if inner.state == PlayerState::Ended && inner.anchor_secs < self.media.duration_secs {
            inner.state = PlayerState::Paused;
        }
        Ok(())
    }

    async fn current_time(&self) -> Result<f64> {
        self.current_time_reads.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let mut inner = self.lock();
        self.ensure_live(&inner)?;
        self.ensure_started(now)?;
        Ok(self.position_locked(&mut inner, now))
    }

    async fn duration(&self) -> Result<f64> {
        self.duration_reads.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let inner = self.lock();
        self.ensure_live(&inner)?;
        if now.duration_since(self.created_at) < self.media.metadata_delay {
            return Err(PlayerError::NotReady);
        }
        Ok(self.media.duration_secs)
    }

    async fn player_state(&self) -> Result<PlayerState> {
        let now = Instant::now();
        let mut inner = self.lock();
        self.ensure_live(&inner)?;
        self.ensure_started(now)?;
        self.position_locked(&mut inner, now);
        Ok(inner.state)
    }

    async fn release(&self) {
        let mut inner = self.lock();
        if inner.released {
            return;
        }
        self.record(&mut inner, PlayerCall::Release);
        inner.released = true;
        debug!(media_id = %self.config.media_id, mode = %self.config.mode, "simulated player released");
    }
}

/// Factory that hands out [`SimulatedPlayer`]s and keeps them for inspection.
#[derive(Debug)]
pub struct SimulatedPlayerFactory {
    media: SimulatedMedia,
    fail_next: Mutex<Option<String>>,
    created: Mutex<Vec<Arc<SimulatedPlayer>>>,
}

impl SimulatedPlayerFactory {
    pub fn new(media: SimulatedMedia) -> Self {
        Self {
            media,
            fail_next: Mutex::new(None),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Makes the next `create` call fail with `reason`.
    pub fn fail_next_create(&self, reason: impl Into<String>) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    /// Every player created so far, oldest first.
    pub fn players(&self) -> Vec<Arc<SimulatedPlayer>> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn latest(&self) -> Option<Arc<SimulatedPlayer>> {
        self.players().last().cloned()
    }
}

impl PlayerFactory for SimulatedPlayerFactory {
    fn create(&self, config: &PlayerConfig) -> Result<Arc<dyn PlayerHandle>> {
        if let Some(reason) = self
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(PlayerError::CreateFailed { reason });
        }

        let player = Arc::new(SimulatedPlayer::new(config.clone(), self.media.clone()));
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&player));
        debug!(media_id = %config.media_id, mode = %config.mode, "simulated player created");
        Ok(player)
    }
}
