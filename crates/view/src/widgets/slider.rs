use lesson_engine::PlaybackState;
use lesson_engine::time::{format_timestamp, ms_to_seconds};

/// Values needed to draw the seek slider and its time labels.
#[derive(Debug, Clone, PartialEq)]
pub struct SliderModel {
    pub value_ms: u64,
    pub max_ms: u64,
    /// Thumb position in `[0, 1]`.
    pub fraction: f32,
    pub position_label: String,
    pub duration_label: String,
    /// Seeking is only offered once the duration is known.
    pub enabled: bool,
}

/// Interaction result emitted by the slider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SliderInteraction {
    Dragged { seconds: f64 },
}

pub fn build_slider_model(state: &PlaybackState) -> SliderModel {
    let value_ms = state.display_position_ms();
    let fraction = if state.duration_ms == 0 {
        0.0
    } else {
        value_ms as f32 / state.duration_ms as f32
    };

    SliderModel {
        value_ms,
        max_ms: state.duration_ms,
        fraction,
        position_label: format_timestamp(value_ms),
        duration_label: format_timestamp(state.duration_ms),
        enabled: state.is_initialized() && state.duration_ms > 0,
    }
}

/// Maps a pointer X position onto the media timeline, in seconds.
pub fn seconds_at_x(x_px: f32, width_px: f32, duration_ms: u64) -> f64 {
    if duration_ms == 0 || width_px <= 0.0 {
        return 0.0;
    }

    let normalized = f64::from((x_px / width_px).clamp(0.0, 1.0));
    normalized * ms_to_seconds(duration_ms)
}

/// Creates a seek interaction from a drag update on the slider.
pub fn drag_to_x(x_px: f32, width_px: f32, duration_ms: u64) -> SliderInteraction {
    SliderInteraction::Dragged {
        seconds: seconds_at_x(x_px, width_px, duration_ms),
    }
}

#[cfg(test)]
mod tests {
    use lesson_engine::{PlaybackState, SessionPhase};

    use super::{SliderInteraction, build_slider_model, drag_to_x, seconds_at_x};

    #[test]
    fn model_clamps_position_to_duration_and_formats_labels() {
        let state = PlaybackState {
            position_ms: 125_400,
            duration_ms: 120_000,
            phase: SessionPhase::Ready,
            ..PlaybackState::default()
        };

        let model = build_slider_model(&state);

        assert_eq!(model.value_ms, 120_000);
        assert_eq!(model.fraction, 1.0);
        assert_eq!(model.position_label, "00:02:00");
        assert_eq!(model.duration_label, "00:02:00");
        assert!(model.enabled);
    }

    #[test]
    fn slider_is_disabled_until_duration_is_known() {
        let state = PlaybackState {
            position_ms: 4_000,
            phase: SessionPhase::Ready,
            ..PlaybackState::default()
        };

        let model = build_slider_model(&state);

        assert_eq!(model.fraction, 0.0);
        assert_eq!(model.position_label, "00:00:04");
        assert!(!model.enabled);
    }

    #[test]
    fn pointer_position_is_clamped_and_scaled() {
        assert_eq!(seconds_at_x(-10.0, 200.0, 60_000), 0.0);
        assert_eq!(seconds_at_x(100.0, 200.0, 60_000), 30.0);
        assert_eq!(seconds_at_x(260.0, 200.0, 60_000), 60.0);
        assert_eq!(seconds_at_x(50.0, 0.0, 60_000), 0.0);
        assert_eq!(seconds_at_x(50.0, 200.0, 0), 0.0);
    }

    #[test]
    fn drag_emits_seek_interaction() {
        assert_eq!(
            drag_to_x(50.0, 200.0, 8_000),
            SliderInteraction::Dragged { seconds: 2.0 }
        );
    }
}
