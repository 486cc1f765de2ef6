use lesson_engine::time::format_timestamp;
use lesson_engine::{Command, PlaybackSnapshot};

use crate::widgets::slider::{SliderInteraction, SliderModel, build_slider_model, drag_to_x};
use crate::widgets::transcript_list::{
    FollowConfig, FollowInput, ListLayout, ScrollDirective, TranscriptListSync,
};

/// UI message consumed by update.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Session(PlaybackSnapshot),
    /// The transcript list finished a layout pass.
    LayoutChanged(ListLayout),
    SegmentTapped(usize),
    SliderDragged { seconds: f64 },
    PlayPauseToggled,
    ModeToggled,
    TranslationToggled,
}

impl Message {
    /// Converts a slider interaction into an app message.
    pub fn from_slider(interaction: SliderInteraction) -> Self {
        match interaction {
            SliderInteraction::Dragged { seconds } => Self::SliderDragged { seconds },
        }
    }
}

/// One transcript line as drawn by the list.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRow {
    pub index: usize,
    pub start_label: String,
    /// `None` for narration.
    pub speaker: Option<String>,
    pub text: String,
    /// Present only while translations are shown.
    pub translation: Option<String>,
    pub is_active: bool,
}

/// UI state for the lesson player screen.
#[derive(Debug, Clone)]
pub struct LessonScreen {
    snapshot: PlaybackSnapshot,
    layout: ListLayout,
    list_sync: TranscriptListSync,
    scroll_queue: Vec<ScrollDirective>,
}

impl Default for LessonScreen {
    fn default() -> Self {
        Self::new(FollowConfig::default())
    }
}

impl LessonScreen {
    pub fn new(follow: FollowConfig) -> Self {
        Self {
            snapshot: PlaybackSnapshot::default(),
            layout: ListLayout::default(),
            list_sync: TranscriptListSync::new(follow),
            scroll_queue: Vec::new(),
        }
    }

    /// Applies one UI message and returns outgoing session commands.
    pub fn update(&mut self, message: Message) -> Vec<Command> {
        match message {
            Message::Session(snapshot) => {
                let input = FollowInput::from(&snapshot.state);
                self.snapshot = snapshot;
                let directive = self.list_sync.observe(input, &self.layout);
                self.queue_scroll(directive);
                Vec::new()
            }
            Message::LayoutChanged(layout) => {
                self.layout = layout;
                let directive = self.list_sync.after_layout(&self.layout);
                self.queue_scroll(directive);
                Vec::new()
            }
            Message::SegmentTapped(index) => vec![Command::SeekToSegment { index }],
            Message::SliderDragged { seconds } => {
                if self.snapshot.state.duration_ms == 0 {
                    return Vec::new();
                }
                vec![Command::Seek { seconds }]
            }
            Message::PlayPauseToggled => {
                if self.snapshot.state.is_playing {
                    vec![Command::Pause]
                } else {
                    vec![Command::Play]
                }
            }
            Message::ModeToggled => vec![Command::SwitchMode {
                mode: self.snapshot.state.mode.toggled(),
            }],
            Message::TranslationToggled => vec![Command::ToggleTranslation],
        }
    }

    /// Drains scroll actions the list should perform, oldest first.
    pub fn take_scroll_directives(&mut self) -> Vec<ScrollDirective> {
        std::mem::take(&mut self.scroll_queue)
    }

    pub fn snapshot(&self) -> &PlaybackSnapshot {
        &self.snapshot
    }

    pub fn slider_model(&self) -> SliderModel {
        build_slider_model(&self.snapshot.state)
    }

    /// Handles a pointer drag on a slider `width_px` wide.
    pub fn drag_slider(&mut self, x_px: f32, width_px: f32) -> Vec<Command> {
        let interaction = drag_to_x(x_px, width_px, self.snapshot.state.duration_ms);
        self.update(Message::from_slider(interaction))
    }

    /// Render data for every transcript line.
    pub fn transcript_rows(&self) -> Vec<TranscriptRow> {
        let state = &self.snapshot.state;
        self.snapshot
            .transcript
            .segments()
            .iter()
            .map(|segment| TranscriptRow {
                index: segment.index,
                start_label: format_timestamp(segment.start_ms),
                speaker: (!segment.is_narration()).then(|| segment.speaker.clone()),
                text: segment.text.clone(),
                translation: state
                    .show_translation
                    .then(|| segment.translation().map(str::to_string))
                    .flatten(),
                is_active: state.current_segment_index == Some(segment.index),
            })
            .collect()
    }

    /// Message shown instead of the player when initialization failed.
    pub fn error_banner(&self) -> Option<&str> {
        self.snapshot.state.error_message.as_deref()
    }

    fn queue_scroll(&mut self, directive: Option<ScrollDirective>) {
        if let Some(directive) = directive {
            self.scroll_queue.push(directive);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lesson_engine::{
        Command, PlaybackMode, PlaybackSnapshot, PlaybackState, SessionPhase, Transcript,
        TranscriptSegment,
    };

    use super::{LessonScreen, Message};
    use crate::widgets::transcript_list::{ListLayout, RowLayout, ScrollDirective};

    fn transcript() -> Arc<Transcript> {
        Arc::new(Transcript::new(vec![
            TranscriptSegment {
                index: 0,
                text: "Welcome to the lesson.".to_string(),
                speaker: String::new(),
                translation: Some("Bienvenue.".to_string()),
                start_ms: 0,
                end_ms: 3_000,
            },
            TranscriptSegment {
                index: 1,
                text: "Hi!".to_string(),
                speaker: "Speaker 1".to_string(),
                translation: Some("Salut !".to_string()),
                start_ms: 3_000,
                end_ms: 7_000,
            },
        ]))
    }

    fn snapshot(state: PlaybackState) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state,
            transcript: transcript(),
        }
    }

    fn ready(index: Option<usize>, seek_version: u64) -> PlaybackState {
        PlaybackState {
            phase: SessionPhase::Ready,
            duration_ms: 7_000,
            current_segment_index: index,
            seek_version,
            ..PlaybackState::default()
        }
    }

    fn two_row_layout() -> ListLayout {
        ListLayout {
            scroll_offset: 0.0,
            viewport_height: 90.0,
            max_scroll_extent: 10.0,
            item_count: 2,
            mounted: vec![
                RowLayout {
                    index: 0,
                    top: 0.0,
                    height: 50.0,
                },
                RowLayout {
                    index: 1,
                    top: 50.0,
                    height: 50.0,
                },
            ],
        }
    }

    #[test]
    fn play_pause_follows_current_playing_flag() {
        let mut screen = LessonScreen::default();
        assert_eq!(screen.update(Message::PlayPauseToggled), vec![Command::Play]);

        let playing = PlaybackState {
            is_playing: true,
            ..ready(None, 0)
        };
        screen.update(Message::Session(snapshot(playing)));

        assert_eq!(screen.update(Message::PlayPauseToggled), vec![Command::Pause]);
    }

    #[test]
    fn taps_and_toggles_become_session_commands() {
        let mut screen = LessonScreen::default();
        screen.update(Message::Session(snapshot(ready(Some(0), 0))));

        assert_eq!(
            screen.update(Message::SegmentTapped(1)),
            vec![Command::SeekToSegment { index: 1 }]
        );
        assert_eq!(
            screen.update(Message::ModeToggled),
            vec![Command::SwitchMode {
                mode: PlaybackMode::Audio
            }]
        );
        assert_eq!(
            screen.update(Message::TranslationToggled),
            vec![Command::ToggleTranslation]
        );
    }

    #[test]
    fn slider_drag_is_ignored_until_duration_is_known() {
        let mut screen = LessonScreen::default();
        assert!(screen.update(Message::SliderDragged { seconds: 2.0 }).is_empty());

        screen.update(Message::Session(snapshot(ready(None, 0))));
        assert_eq!(
            screen.update(Message::SliderDragged { seconds: 2.0 }),
            vec![Command::Seek { seconds: 2.0 }]
        );
    }

    #[test]
    fn pointer_drag_maps_onto_the_timeline() {
        let mut screen = LessonScreen::default();
        assert!(screen.drag_slider(100.0, 200.0).is_empty());

        screen.update(Message::Session(snapshot(ready(None, 0))));

        assert_eq!(
            screen.drag_slider(100.0, 200.0),
            vec![Command::Seek { seconds: 3.5 }]
        );
        assert_eq!(
            screen.drag_slider(400.0, 200.0),
            vec![Command::Seek { seconds: 7.0 }]
        );
    }

    #[test]
    fn snapshots_drive_list_scrolling() {
        let mut screen = LessonScreen::default();
        screen.update(Message::LayoutChanged(two_row_layout()));
        screen.update(Message::Session(snapshot(ready(Some(0), 0))));
        assert!(screen.take_scroll_directives().is_empty());

        screen.update(Message::Session(snapshot(ready(Some(1), 1))));

        assert_eq!(
            screen.take_scroll_directives(),
            vec![ScrollDirective::Jump { offset: 10.0 }]
        );
        assert!(screen.take_scroll_directives().is_empty());
    }

    #[test]
    fn rows_show_speaker_translation_and_highlight() {
        let mut screen = LessonScreen::default();
        let state = PlaybackState {
            show_translation: true,
            ..ready(Some(1), 0)
        };
        screen.update(Message::Session(snapshot(state)));

        let rows = screen.transcript_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].speaker, None);
        assert_eq!(rows[0].translation.as_deref(), Some("Bienvenue."));
        assert!(!rows[0].is_active);
        assert_eq!(rows[1].speaker.as_deref(), Some("Speaker 1"));
        assert_eq!(rows[1].start_label, "00:00:03");
        assert!(rows[1].is_active);
    }

    #[test]
    fn error_message_is_exposed_as_banner() {
        let mut screen = LessonScreen::default();
        let failed = PlaybackState {
            phase: SessionPhase::Error,
            error_message: Some("failed to start video player".to_string()),
            ..PlaybackState::default()
        };
        screen.update(Message::Session(snapshot(failed)));

        assert_eq!(screen.error_banner(), Some("failed to start video player"));
    }
}
