//! External player capability consumed by the lesson engine.

mod error;
mod handle;
pub mod simulated;

pub use error::{PlayerError, Result};
pub use handle::{PlaybackMode, PlayerConfig, PlayerFactory, PlayerHandle, PlayerState};
pub use simulated::{PlayerCall, SimulatedMedia, SimulatedPlayer, SimulatedPlayerFactory};
