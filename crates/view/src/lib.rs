//! Toolkit-agnostic lesson screen: transcript list follow, seek slider and
//! the bridge to a playback session.

pub mod app;
pub mod bridge;
pub mod widgets;

pub use app::{LessonScreen, Message, TranscriptRow};
pub use bridge::{BridgeError, SessionBridge};
pub use widgets::slider::{SliderInteraction, SliderModel};
pub use widgets::transcript_list::{
    FollowConfig, FollowInput, ListLayout, RowLayout, ScrollDirective, TranscriptListSync,
};
