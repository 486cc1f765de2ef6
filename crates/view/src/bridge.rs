use std::fmt::{Display, Formatter};

use lesson_engine::{Command, EngineError, PlaybackSnapshot, SessionHandle};
use tokio::sync::watch;

/// Bridge between UI state and the playback session.
///
/// Never blocks: commands are queued and snapshots are pulled once per
/// frame.
#[derive(Debug)]
pub struct SessionBridge {
    session: SessionHandle,
    snapshots: watch::Receiver<PlaybackSnapshot>,
}

impl SessionBridge {
    pub fn new(session: SessionHandle) -> Self {
        let snapshots = session.subscribe();
        Self {
            session,
            snapshots,
        }
    }

    /// Queues one command for the session.
    pub fn send_command(&self, command: Command) -> Result<(), BridgeError> {
        self.session.dispatch(command).map_err(|error| match error {
            EngineError::SessionBusy => BridgeError::Busy,
            _ => BridgeError::Disconnected,
        })
    }

    /// Returns the latest snapshot if it changed since the previous call.
    pub fn poll_snapshot(&mut self) -> Result<Option<PlaybackSnapshot>, BridgeError> {
        match self.snapshots.has_changed() {
            Ok(true) => Ok(Some(self.snapshots.borrow_and_update().clone())),
            Ok(false) => Ok(None),
            Err(_) => Err(BridgeError::Disconnected),
        }
    }

    /// Latest snapshot, whether or not it was already seen.
    pub fn current(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }
}

/// Error raised by the UI-session bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    Disconnected,
    Busy,
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "playback session is gone"),
            Self::Busy => write!(f, "playback session is busy"),
        }
    }
}

impl std::error::Error for BridgeError {}
