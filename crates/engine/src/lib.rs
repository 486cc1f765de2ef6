//! UI-agnostic playback and transcript synchronization engine.

pub mod api;
pub mod config;
pub mod debounce;
pub mod error;
pub mod machine;
mod poller;
pub mod prefs;
pub mod session;
pub mod time;
pub mod transcript;

pub use api::{Command, PlaybackSnapshot, PlaybackState, SessionPhase};
pub use config::SessionConfig;
pub use error::{EngineError, Result};
pub use machine::{PlaybackMachine, PollSample};
pub use prefs::{JsonFilePreferences, MemoryPreferences, PreferenceStore};
pub use session::SessionHandle;
pub use transcript::{DocumentSegment, DocumentTime, Transcript, TranscriptDocument, TranscriptSegment};

pub use lesson_player::{PlaybackMode, PlayerState};
