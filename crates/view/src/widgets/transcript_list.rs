//! Scroll-follow for the virtualized transcript list.
//!
//! The list never reads playback state directly: it is fed snapshots and
//! layout passes, and answers with [`ScrollDirective`]s for the toolkit to
//! execute.

use std::time::Duration;

use lesson_engine::PlaybackState;

/// Tuning for soft-follow scrolling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowConfig {
    /// Fraction of the viewport height above the active row.
    pub alignment: f32,
    pub animation: Duration,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            alignment: 1.0 / 3.0,
            animation: Duration::from_millis(300),
        }
    }
}

/// Geometry of one mounted row, in content coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowLayout {
    pub index: usize,
    pub top: f32,
    pub height: f32,
}

impl RowLayout {
    fn bottom(&self) -> f32 {
        self.top + self.height
    }

    fn center(&self) -> f32 {
        self.top + self.height / 2.0
    }
}

/// State of the list after a layout pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListLayout {
    pub scroll_offset: f32,
    pub viewport_height: f32,
    pub max_scroll_extent: f32,
    pub item_count: usize,
    /// Rows the virtualized list has built, in index order.
    pub mounted: Vec<RowLayout>,
}

impl ListLayout {
    pub fn row(&self, index: usize) -> Option<&RowLayout> {
        self.mounted.iter().find(|row| row.index == index)
    }

    /// Row top relative to the viewport top.
    pub fn screen_offset(&self, row: &RowLayout) -> f32 {
        row.top - self.scroll_offset
    }

    pub fn is_visible(&self, row: &RowLayout) -> bool {
        let viewport_bottom = self.scroll_offset + self.viewport_height;
        row.bottom() > self.scroll_offset && row.top < viewport_bottom
    }

    fn clamp_offset(&self, offset: f32) -> f32 {
        offset.clamp(0.0, self.max_scroll_extent.max(0.0))
    }
}

/// Scroll action requested from the toolkit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollDirective {
    /// Eased scroll used while playback drifts from line to line.
    Animate { offset: f32, duration: Duration },
    Jump { offset: f32 },
    /// The target row is not mounted. Jump to the interpolated `offset`; a
    /// precise jump follows on the next layout pass.
    EstimateThenAlign { index: usize, offset: f32 },
}

impl ScrollDirective {
    pub fn offset(&self) -> f32 {
        match self {
            Self::Animate { offset, .. }
            | Self::Jump { offset }
            | Self::EstimateThenAlign { offset, .. } => *offset,
        }
    }
}

/// The parts of a snapshot the list reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowInput {
    pub current_segment_index: Option<usize>,
    pub seek_version: u64,
    pub show_translation: bool,
}

impl From<&PlaybackState> for FollowInput {
    fn from(state: &PlaybackState) -> Self {
        Self {
            current_segment_index: state.current_segment_index,
            seek_version: state.seek_version,
            show_translation: state.show_translation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    index: usize,
    screen_offset: f32,
}

/// Decides how the transcript list follows playback.
#[derive(Debug, Clone, Default)]
pub struct TranscriptListSync {
    config: FollowConfig,
    last: Option<FollowInput>,
    pending_align: Option<usize>,
    anchor: Option<Anchor>,
}

impl TranscriptListSync {
    pub fn new(config: FollowConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &FollowConfig {
        &self.config
    }

    /// Row awaiting a precise align after an estimated jump.
    pub fn pending_align(&self) -> Option<usize> {
        self.pending_align
    }

    /// Reacts to a new snapshot. `layout` is what is on screen now, before
    /// any relayout the snapshot causes.
    ///
    /// The first observation only records a baseline.
    pub fn observe(&mut self, input: FollowInput, layout: &ListLayout) -> Option<ScrollDirective> {
        let previous = self.last.replace(input)?;

        if input.seek_version != previous.seek_version {
            self.anchor = None;
            let index = input.current_segment_index?;
            return Some(self.scroll_to(index, layout, false));
        }

        if input.show_translation != previous.show_translation {
            self.anchor = self.capture_anchor(input.current_segment_index, layout);
            return None;
        }

        if input.current_segment_index != previous.current_segment_index {
            let index = input.current_segment_index?;
            return Some(self.scroll_to(index, layout, true));
        }

        None
    }

    /// Reacts to a finished layout pass: corrects the anchor after a
    /// translation toggle, or finishes an estimated jump.
    pub fn after_layout(&mut self, layout: &ListLayout) -> Option<ScrollDirective> {
        if let Some(anchor) = self.anchor.take() {
            let row = layout.row(anchor.index)?;
            let offset = layout.clamp_offset(row.top - anchor.screen_offset);
            if (offset - layout.scroll_offset).abs() < 0.5 {
                return None;
            }
            return Some(ScrollDirective::Jump { offset });
        }

        let index = self.pending_align?;
        let row = layout.row(index)?;
        self.pending_align = None;
        Some(ScrollDirective::Jump {
            offset: self.aligned_offset(row, layout),
        })
    }

    fn scroll_to(&mut self, index: usize, layout: &ListLayout, animate: bool) -> ScrollDirective {
        let Some(row) = layout.row(index) else {
            self.pending_align = Some(index);
            let fraction = if layout.item_count == 0 {
                0.0
            } else {
                index as f32 / layout.item_count as f32
            };
            return ScrollDirective::EstimateThenAlign {
                index,
                offset: layout.clamp_offset(fraction * layout.max_scroll_extent),
            };
        };

        self.pending_align = None;
        let offset = self.aligned_offset(row, layout);
        if animate {
            ScrollDirective::Animate {
                offset,
                duration: self.config.animation,
            }
        } else {
            ScrollDirective::Jump { offset }
        }
    }

    fn aligned_offset(&self, row: &RowLayout, layout: &ListLayout) -> f32 {
        layout.clamp_offset(row.top - layout.viewport_height * self.config.alignment)
    }

    /// Active row when visible, otherwise the visible row closest to the
    /// viewport center.
    fn capture_anchor(&self, active: Option<usize>, layout: &ListLayout) -> Option<Anchor> {
        let active_row = active
            .and_then(|index| layout.row(index))
            .filter(|row| layout.is_visible(row));

        let row = active_row.or_else(|| {
            let center = layout.scroll_offset + layout.viewport_height / 2.0;
            layout
                .mounted
                .iter()
                .filter(|row| layout.is_visible(row))
                .min_by(|a, b| {
                    let da = (a.center() - center).abs();
                    let db = (b.center() - center).abs();
                    da.total_cmp(&db)
                })
        })?;

        Some(Anchor {
            index: row.index,
            screen_offset: layout.screen_offset(row),
        })
    }
}
