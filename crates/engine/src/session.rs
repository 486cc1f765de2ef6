//! Playback session actor.
//!
//! One task owns the [`PlaybackMachine`] and is the only writer of playback
//! state. Commands arrive over an mpsc channel; every mutation is published
//! as a [`PlaybackSnapshot`] on a watch channel that the UI pulls from.

use std::sync::Arc;

use lesson_player::{PlaybackMode, PlayerConfig, PlayerFactory, PlayerHandle, PlayerState};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::api::{Command, PlaybackSnapshot, SessionPhase};
use crate::config::SessionConfig;
use crate::debounce::{QuietWindow, sleep_until_deadline};
use crate::error::{EngineError, Result};
use crate::machine::PlaybackMachine;
use crate::poller::{TaggedSample, spawn_poller};
use crate::prefs::PreferenceStore;
use crate::time::ms_to_seconds;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const SAMPLE_CHANNEL_CAPACITY: usize = 8;

struct Envelope {
    command: Command,
    reply: Option<oneshot::Sender<Result<()>>>,
}

/// Cloneable front door to a running playback session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Envelope>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("command", &self.command.name())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Spawns a session actor on the current tokio runtime.
    ///
    /// The session starts `Uninitialized` in the preferred playback mode and
    /// waits for [`Command::Initialize`].
    pub fn spawn(
        factory: Arc<dyn PlayerFactory>,
        prefs: Arc<dyn PreferenceStore>,
        config: SessionConfig,
    ) -> Self {
        let machine = PlaybackMachine::new(prefs.playback_mode());
        let (publisher, snapshots) = watch::channel(machine.snapshot());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (sample_tx, sample_rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();

        let actor = SessionActor {
            config,
            factory,
            prefs,
            machine,
            seek_window: QuietWindow::new(config.seek_quiet_window()),
            player: None,
            media_id: None,
            next_generation: 1,
            seek_request: 0,
            pending_settle: None,
            publisher,
            sample_tx,
            settled_tx,
            session_cancel: CancellationToken::new(),
        };
        tokio::spawn(actor.run(command_rx, sample_rx, settled_rx));

        Self {
            commands: command_tx,
            snapshots,
        }
    }

    /// Sends a command and waits until the session has applied it.
    pub async fn send(&self, command: Command) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Envelope {
                command,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| EngineError::SessionClosed)?;
        reply_rx.await.map_err(|_| EngineError::SessionClosed)?
    }

    /// Queues a command without waiting. Failures inside the session are
    /// only logged.
    pub fn dispatch(&self, command: Command) -> Result<()> {
        self.commands
            .try_send(Envelope {
                command,
                reply: None,
            })
            .map_err(|error| match error {
                TrySendError::Full(_) => EngineError::SessionBusy,
                TrySendError::Closed(_) => EngineError::SessionClosed,
            })
    }

    /// New receiver on the notification channel.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    pub async fn initialize(
        &self,
        media_id: impl Into<String>,
        transcript: Arc<crate::Transcript>,
        mode: PlaybackMode,
    ) -> Result<()> {
        self.send(Command::Initialize {
            media_id: media_id.into(),
            transcript,
            mode,
        })
        .await
    }

    pub async fn play(&self) -> Result<()> {
        self.send(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    pub async fn seek(&self, seconds: f64) -> Result<()> {
        self.send(Command::Seek { seconds }).await
    }

    pub async fn seek_to_segment(&self, index: usize) -> Result<()> {
        self.send(Command::SeekToSegment { index }).await
    }

    pub async fn switch_mode(&self, mode: PlaybackMode) -> Result<()> {
        self.send(Command::SwitchMode { mode }).await
    }

    pub async fn toggle_translation(&self) -> Result<()> {
        self.send(Command::ToggleTranslation).await
    }

    pub async fn dispose(&self) -> Result<()> {
        self.send(Command::Dispose).await
    }
}

struct ActivePlayer {
    handle: Arc<dyn PlayerHandle>,
    generation: u64,
    cancel: CancellationToken,
    poller: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy)]
struct SettledSeek {
    generation: u64,
    /// Seek request this settle belongs to; a newer request supersedes it.
    request: u64,
    index: usize,
    target_ms: u64,
}

struct SessionActor {
    config: SessionConfig,
    factory: Arc<dyn PlayerFactory>,
    prefs: Arc<dyn PreferenceStore>,
    machine: PlaybackMachine,
    seek_window: QuietWindow,
    player: Option<ActivePlayer>,
    media_id: Option<String>,
    next_generation: u64,
    seek_request: u64,
    pending_settle: Option<CancellationToken>,
    publisher: watch::Sender<PlaybackSnapshot>,
    sample_tx: mpsc::Sender<TaggedSample>,
    settled_tx: mpsc::UnboundedSender<SettledSeek>,
    session_cancel: CancellationToken,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Envelope>,
        mut samples: mpsc::Receiver<TaggedSample>,
        mut settled: mpsc::UnboundedReceiver<SettledSeek>,
    ) {
        loop {
            let seek_deadline = self.seek_window.deadline();
            tokio::select! {
                biased;
                envelope = commands.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        debug!("all session handles dropped");
                        self.dispose().await;
                        break;
                    };
                    let is_dispose = matches!(command, Command::Dispose);
                    let name = command.name();
                    let result = self.handle_command(command).await;
                    if let Err(error) = &result {
                        debug!(command = name, %error, "command rejected");
                    }
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                    if is_dispose {
                        break;
                    }
                }
                Some(tagged) = samples.recv() => self.apply_sample(tagged),
                Some(seek) = settled.recv() => self.apply_settled_seek(seek),
                _ = sleep_until_deadline(seek_deadline) => self.finish_seek(),
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Initialize {
                media_id,
                transcript,
                mode,
            } => self.initialize(media_id, transcript, mode).await,
            Command::Play => self.set_playing(true),
            Command::Pause => self.set_playing(false),
            Command::Seek { seconds } => self.request_seek(seconds),
            Command::SeekToSegment { index } => self.seek_to_segment(index),
            Command::SwitchMode { mode } => self.switch_mode(mode).await,
            Command::ToggleTranslation => {
                self.machine.toggle_translation();
                self.publish();
                Ok(())
            }
            Command::Dispose => {
                self.dispose().await;
                Ok(())
            }
        }
    }

    async fn initialize(
        &mut self,
        media_id: String,
        transcript: Arc<crate::Transcript>,
        mode: PlaybackMode,
    ) -> Result<()> {
        self.teardown_player();
        self.seek_window.cancel();
        info!(
            %media_id,
            %mode,
            segment_count = transcript.len(),
            "initializing playback session"
        );
        self.machine.begin_initialize(transcript, mode);
        self.media_id = Some(media_id.clone());
        self.publish();

        match self.open_player(&media_id, mode).await {
            Ok(handle) => {
                self.attach_player(handle, mode);
                self.machine.finish_initialize();
                self.publish();
                Ok(())
            }
            Err(error) => {
                warn!(%media_id, %error, "player initialization failed");
                self.machine.fail(error.to_string());
                self.publish();
                Err(error)
            }
        }
    }

    /// Creates and cues a handle for `mode`.
    async fn open_player(
        &self,
        media_id: &str,
        mode: PlaybackMode,
    ) -> Result<Arc<dyn PlayerHandle>> {
        let context = match mode {
            PlaybackMode::Video => "failed to start video player",
            PlaybackMode::Audio => "failed to start audio player",
        };
        let handle = self
            .factory
            .create(&PlayerConfig::new(media_id, mode))
            .map_err(|source| EngineError::PlayerInit { context, source })?;

        let cue_result = tokio::time::timeout(self.config.init_timeout(), handle.cue(media_id)).await;
        let cue_error = match cue_result {
            Ok(Ok(())) => None,
            Ok(Err(source)) => Some(EngineError::PlayerInit { context, source }),
            Err(_) => Some(EngineError::InitTimeout {
                context,
                after: self.config.init_timeout(),
            }),
        };
        if let Some(error) = cue_error {
            tokio::spawn(async move { handle.release().await });
            return Err(error);
        }
        Ok(handle)
    }

    /// Makes `handle` the live player under a fresh generation and starts its
    /// poller. Samples read before this point can never be applied.
    fn attach_player(&mut self, handle: Arc<dyn PlayerHandle>, mode: PlaybackMode) {
        let generation = self.next_generation;
        self.next_generation += 1;
        let cancel = self.session_cancel.child_token();
        let poller = spawn_poller(
            Arc::clone(&handle),
            generation,
            self.config,
            self.machine.duration_known(),
            self.sample_tx.clone(),
            cancel.clone(),
        );
        debug!(generation, %mode, "player started");

        self.player = Some(ActivePlayer {
            handle,
            generation,
            cancel,
            poller,
        });
    }

    /// Stops the live handle's poller at once and releases it in the
    /// background.
    fn teardown_player(&mut self) {
        self.pending_settle = None;
        let Some(player) = self.player.take() else {
            return;
        };
        player.cancel.cancel();
        player.poller.abort();
        debug!(generation = player.generation, "player torn down");
        let handle = player.handle;
        tokio::spawn(async move { handle.release().await });
    }

    fn live_player(&self) -> Result<&ActivePlayer> {
        self.machine.ensure_ready()?;
        self.player.as_ref().ok_or(EngineError::NotReady {
            phase: self.machine.state().phase,
        })
    }

    fn set_playing(&mut self, playing: bool) -> Result<()> {
        let handle = Arc::clone(&self.live_player()?.handle);
        if playing {
            tokio::spawn(async move { report_command("play", handle.play().await) });
        } else {
            tokio::spawn(async move { report_command("pause", handle.pause().await) });
        }
        self.machine.set_playing(playing);
        self.publish();
        Ok(())
    }

    /// Starts a new seek request. Any tap-to-seek still waiting to settle is
    /// cancelled and its result will be dropped.
    fn supersede_pending_seek(&mut self) -> u64 {
        if let Some(pending) = self.pending_settle.take() {
            pending.cancel();
            debug!(request = self.seek_request, "pending segment seek superseded");
        }
        self.seek_request += 1;
        self.seek_request
    }

    fn request_seek(&mut self, seconds: f64) -> Result<()> {
        let handle = Arc::clone(&self.live_player()?.handle);
        let target_ms = self.machine.begin_seek(seconds)?;
        self.supersede_pending_seek();
        self.seek_window.rearm(Instant::now());

        tokio::spawn(async move {
            report_command("seek_to", handle.seek_to(ms_to_seconds(target_ms), true).await)
        });
        debug!(
            target_ms,
            segment = ?self.machine.state().current_segment_index,
            seek_version = self.machine.state().seek_version,
            "seek requested"
        );
        self.publish();
        Ok(())
    }

    fn seek_to_segment(&mut self, index: usize) -> Result<()> {
        let player = self.live_player()?;
        let target_ms = self
            .machine
            .segment_seek_target(index, self.config.segment_seek_offset_ms)?;
        let handle = Arc::clone(&player.handle);
        let generation = player.generation;
        let cancel = player.cancel.child_token();

        let request = self.supersede_pending_seek();
        self.pending_settle = Some(cancel.clone());

        let seek_handle = Arc::clone(&handle);
        tokio::spawn(async move {
            report_command(
                "seek_to",
                seek_handle.seek_to(ms_to_seconds(target_ms), true).await,
            )
        });

        let settled_tx = self.settled_tx.clone();
        let settle = self.config.seek_settle();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(settle) => {}
            }
            report_command("play", handle.play().await);
            let _ = settled_tx.send(SettledSeek {
                generation,
                request,
                index,
                target_ms,
            });
        });
        debug!(index, target_ms, request, "segment seek issued");
        Ok(())
    }

    fn apply_settled_seek(&mut self, seek: SettledSeek) {
        let current = self.player.as_ref().map(|player| player.generation);
        if current != Some(seek.generation) || self.machine.ensure_ready().is_err() {
            trace!(generation = seek.generation, "dropping settled seek from stale player");
            return;
        }
        if seek.request != self.seek_request {
            trace!(
                request = seek.request,
                latest = self.seek_request,
                "dropping superseded settled seek"
            );
            return;
        }
        self.pending_settle = None;
        self.machine.apply_segment_seek(seek.index, seek.target_ms);
        self.publish();
    }

    async fn switch_mode(&mut self, mode: PlaybackMode) -> Result<()> {
        if mode == self.machine.state().mode {
            return Ok(());
        }
        let phase = self.machine.state().phase;
        if !matches!(phase, SessionPhase::Ready | SessionPhase::Error) {
            return Err(EngineError::NotReady { phase });
        }
        let Some(media_id) = self.media_id.clone() else {
            return Err(EngineError::NotReady { phase });
        };

        let resume_at_ms = self.machine.state().position_ms;
        let was_playing = self.machine.state().is_playing;
        info!(from = %self.machine.state().mode, to = %mode, resume_at_ms, "switching playback mode");

        self.teardown_player();
        self.seek_window.cancel();
        self.machine.end_seek();
        self.machine.begin_switch(mode);
        self.publish();

        let handle = match self.open_player(&media_id, mode).await {
            Ok(handle) => handle,
            Err(error) => {
                warn!(%mode, %error, "mode switch failed");
                self.machine.fail(error.to_string());
                self.publish();
                return Err(error);
            }
        };

        // The poller is attached only after the resume seek so its first read
        // cannot report the fresh handle's start position.
        let limit = self.config.mode_switch_state_timeout();
        if resume_at_ms > 0 {
            let seek = tokio::time::timeout(limit, handle.seek_to(ms_to_seconds(resume_at_ms), true));
            report_bounded("seek_to", seek.await);
        }
        if was_playing {
            report_bounded("play", tokio::time::timeout(limit, handle.play()).await);
        }

        let external_playing = match tokio::time::timeout(limit, handle.player_state()).await {
            Ok(Ok(PlayerState::Unstarted)) => None,
            Ok(Ok(state)) => Some(state.is_advancing()),
            Ok(Err(error)) => {
                trace!(%error, "play state unavailable after switch; keeping cached value");
                None
            }
            Err(_) => {
                debug!("play state read timed out after switch; keeping cached value");
                None
            }
        };
        self.attach_player(handle, mode);
        self.machine.finish_switch(external_playing);
        self.persist_mode(mode);
        self.publish();
        Ok(())
    }

    fn persist_mode(&self, mode: PlaybackMode) {
        let prefs = Arc::clone(&self.prefs);
        tokio::task::spawn_blocking(move || {
            if let Err(error) = prefs.set_playback_mode(mode) {
                warn!(%mode, %error, "failed to persist playback mode");
            }
        });
    }

    fn apply_sample(&mut self, tagged: TaggedSample) {
        let current = self.player.as_ref().map(|player| player.generation);
        if current != Some(tagged.generation) {
            trace!(generation = tagged.generation, "dropping sample from stale player");
            return;
        }
        if self.machine.apply_sample(&tagged.sample) {
            self.publish();
        }
    }

    fn finish_seek(&mut self) {
        if self.seek_window.take_if_due(Instant::now()) && self.machine.end_seek() {
            debug!(position_ms = self.machine.state().position_ms, "seek window closed");
            self.publish();
        }
    }

    async fn dispose(&mut self) {
        if self.machine.state().phase == SessionPhase::Disposed {
            return;
        }
        self.seek_window.cancel();
        self.session_cancel.cancel();
        if let Some(player) = self.player.take() {
            player.poller.abort();
            let released =
                tokio::time::timeout(self.config.read_timeout(), player.handle.release()).await;
            if released.is_err() {
                debug!(generation = player.generation, "player release timed out");
            }
        }
        self.machine.dispose();
        self.publish();
        info!("playback session disposed");
    }

    fn publish(&self) {
        let next = self.machine.snapshot();
        self.publisher.send_if_modified(|current| {
            let changed =
                current.state != next.state || !Arc::ptr_eq(&current.transcript, &next.transcript);
            if changed {
                *current = next;
            }
            changed
        });
    }
}

fn report_command(command: &'static str, result: lesson_player::Result<()>) {
    if let Err(error) = result {
        warn!(command, %error, "player command failed");
    }
}

fn report_bounded(
    command: &'static str,
    result: std::result::Result<lesson_player::Result<()>, tokio::time::error::Elapsed>,
) {
    match result {
        Ok(result) => report_command(command, result),
        Err(_) => warn!(command, "player command timed out"),
    }
}
