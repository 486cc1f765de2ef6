use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lesson_player::{PlayerError, PlayerHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::SessionConfig;
use crate::machine::PollSample;

/// Poll result tagged with the player generation it was read from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TaggedSample {
    pub generation: u64,
    pub sample: PollSample,
}

/// Spawns the fixed-interval poller for one player handle.
///
/// Stops when `cancel` fires or the session stops listening. Reads are
/// bounded by timeouts; failures become `None` in the sample and are retried
/// on the next tick.
pub(crate) fn spawn_poller(
    handle: Arc<dyn PlayerHandle>,
    generation: u64,
    config: SessionConfig,
    mut duration_known: bool,
    samples: mpsc::Sender<TaggedSample>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let position_secs =
                bounded_read("current_time", config.read_timeout(), handle.current_time()).await;
            let player_state =
                bounded_read("player_state", config.read_timeout(), handle.player_state()).await;
            let duration_secs = if duration_known {
                None
            } else {
                bounded_read("duration", config.duration_timeout(), handle.duration())
                    .await
                    .filter(|secs| *secs > 0.0)
            };
            if duration_secs.is_some() {
                duration_known = true;
            }

            if cancel.is_cancelled() {
                break;
            }
            let sample = TaggedSample {
                generation,
                sample: PollSample {
                    position_secs,
                    player_state,
                    duration_secs,
                },
            };
            if samples.send(sample).await.is_err() {
                break;
            }
        }
        debug!(generation, "poller stopped");
    })
}

async fn bounded_read<T>(
    operation: &'static str,
    limit: Duration,
    read: impl Future<Output = Result<T, PlayerError>>,
) -> Option<T> {
    let error = match tokio::time::timeout(limit, read).await {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(error)) => error,
        Err(_) => PlayerError::Timeout {
            operation,
            after: limit,
        },
    };
    if error.is_transient() {
        trace!(operation, %error, "player read unavailable; retrying next tick");
    } else {
        debug!(operation, %error, "player read failed; retrying next tick");
    }
    None
}
