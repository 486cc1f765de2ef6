use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::time::{format_timestamp_centis, parse_timestamp, seconds_to_ms};

/// One timed line of a lesson transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSegment {
    pub index: usize,
    pub text: String,
    /// Empty for narration.
    pub speaker: String,
    pub translation: Option<String>,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TranscriptSegment {
    pub fn is_narration(&self) -> bool {
        self.speaker.is_empty()
    }

    pub fn translation(&self) -> Option<&str> {
        self.translation
            .as_deref()
            .filter(|translation| !translation.is_empty())
    }

    /// Segments whose end does not lie after their start never become active.
    pub fn is_zero_width(&self) -> bool {
        self.end_ms <= self.start_ms
    }

    /// Half-open containment: `start <= position < end`.
    pub fn contains(&self, position_ms: u64) -> bool {
        self.start_ms <= position_ms && position_ms < self.end_ms
    }
}

/// Immutable, ordered list of transcript segments for one lesson.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Builds a transcript, renumbering segments by list position.
    ///
    /// Segments are expected in non-decreasing start order. Out-of-order input
    /// is kept as given; lookups then follow list order.
    pub fn new(mut segments: Vec<TranscriptSegment>) -> Self {
        for (index, segment) in segments.iter_mut().enumerate() {
            segment.index = index;
        }

        let transcript = Self { segments };
        if !transcript.is_sorted() {
            warn!(
                segment_count = transcript.len(),
                "transcript segments are not ordered by start time"
            );
        }
        transcript
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn get(&self, index: usize) -> Option<&TranscriptSegment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.segments
            .windows(2)
            .all(|pair| pair[0].start_ms <= pair[1].start_ms)
    }

    /// Returns the first segment, in list order, whose `[start, end)` range
    /// contains `position_ms`. On overlap the earlier segment wins.
    pub fn segment_at(&self, position_ms: u64) -> Option<&TranscriptSegment> {
        self.segments
            .iter()
            .find(|segment| segment.contains(position_ms))
    }

    /// Returns the segment with the greatest start not after `position_ms`.
    ///
    /// Equal starts resolve to the later segment in list order. Zero-width
    /// segments are skipped.
    pub fn last_segment_starting_before_or_at(
        &self,
        position_ms: u64,
    ) -> Option<&TranscriptSegment> {
        let mut best: Option<&TranscriptSegment> = None;
        for segment in &self.segments {
            if segment.is_zero_width() || segment.start_ms > position_ms {
                continue;
            }
            if best.is_none_or(|current| segment.start_ms >= current.start_ms) {
                best = Some(segment);
            }
        }
        best
    }

    /// Exact rule used while playback runs: containment or nothing.
    pub fn resolve_exact(&self, position_ms: u64) -> Option<usize> {
        self.segment_at(position_ms).map(|segment| segment.index)
    }

    /// Rule used right after an explicit seek. Falls back to the most
    /// recently started segment when the position lands in a gap.
    pub fn resolve_gap_aware(&self, position_ms: u64) -> Option<usize> {
        self.segment_at(position_ms)
            .or_else(|| self.last_segment_starting_before_or_at(position_ms))
            .map(|segment| segment.index)
    }

    /// Parses a transcript document (`{ "segments": [...] }`).
    pub fn from_json_str(input: &str) -> Result<Self> {
        let document: TranscriptDocument = serde_json::from_str(input)
            .map_err(|source| EngineError::TranscriptFormat { path: None, source })?;
        document.into_transcript()
    }

    /// Reads and parses a transcript document from disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path).map_err(|source| EngineError::TranscriptIo {
            path: path.to_path_buf(),
            source,
        })?;
        let document: TranscriptDocument =
            serde_json::from_str(&input).map_err(|source| EngineError::TranscriptFormat {
                path: Some(path.to_path_buf()),
                source,
            })?;
        let transcript = document.into_transcript()?;
        debug!(path = %path.display(), segment_count = transcript.len(), "transcript loaded");
        Ok(transcript)
    }

    /// Serializes back into the document form, times as `HH:MM:SS.ss`.
    pub fn to_document(&self) -> TranscriptDocument {
        TranscriptDocument {
            segments: self
                .segments
                .iter()
                .map(|segment| DocumentSegment {
                    text: segment.text.clone(),
                    speaker: Some(segment.speaker.clone()),
                    translation: segment.translation.clone(),
                    start_time: DocumentTime::Text(format_timestamp_centis(segment.start_ms)),
                    end_time: DocumentTime::Text(format_timestamp_centis(segment.end_ms)),
                })
                .collect(),
        }
    }

    /// Returns a cleaned copy: bracketed annotations such as `[music]` are
    /// stripped and whitespace collapsed. An end overlapping the next raw
    /// start is clipped to that start before segments left empty are dropped.
    pub fn normalized(&self) -> Self {
        let cleaned = self
            .segments
            .iter()
            .enumerate()
            .filter_map(|(position, segment)| {
                let text = clean_text(&segment.text);
                if text.is_empty() {
                    return None;
                }
                let end_ms = match self.segments.get(position + 1) {
                    Some(next) => segment.end_ms.min(next.start_ms),
                    None => segment.end_ms,
                };
                Some(TranscriptSegment {
                    text,
                    end_ms,
                    ..segment.clone()
                })
            })
            .collect();

        Self::new(cleaned)
    }
}

fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0_usize;
    for ch in text.chars() {
        match ch {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// On-disk transcript document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptDocument {
    pub segments: Vec<DocumentSegment>,
}

/// One segment as stored in a transcript document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSegment {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    pub start_time: DocumentTime,
    pub end_time: DocumentTime,
}

/// Segment time: `"HH:MM:SS[.fff]"`, or bare seconds as written by the
/// text-length based segment estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentTime {
    Text(String),
    Seconds(f64),
}

impl DocumentTime {
    pub fn to_ms(&self) -> Result<u64> {
        match self {
            Self::Text(text) => parse_timestamp(text),
            Self::Seconds(seconds) if seconds.is_finite() && *seconds >= 0.0 => {
                Ok(seconds_to_ms(*seconds))
            }
            Self::Seconds(seconds) => Err(EngineError::InvalidTimestamp {
                value: seconds.to_string(),
            }),
        }
    }
}

impl TranscriptDocument {
    pub fn into_transcript(self) -> Result<Transcript> {
        let segments = self
            .segments
            .into_iter()
            .enumerate()
            .map(|(index, segment)| {
                Ok(TranscriptSegment {
                    index,
                    text: segment.text,
                    speaker: segment.speaker.unwrap_or_default(),
                    translation: segment.translation,
                    start_ms: segment.start_time.to_ms()?,
                    end_ms: segment.end_time.to_ms()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Transcript::new(segments))
    }
}

#[cfg(test)]
pub(crate) fn segment(start_ms: u64, end_ms: u64, text: &str) -> TranscriptSegment {
    TranscriptSegment {
        index: 0,
        text: text.to_string(),
        speaker: String::new(),
        translation: None,
        start_ms,
        end_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::{Transcript, segment};

    fn gapped() -> Transcript {
        Transcript::new(vec![
            segment(0, 2_000, "first"),
            segment(5_000, 8_000, "second"),
        ])
    }

    #[test]
    fn segment_at_uses_half_open_ranges() {
        let transcript = gapped();

        assert_eq!(transcript.resolve_exact(0), Some(0));
        assert_eq!(transcript.resolve_exact(1_999), Some(0));
        assert_eq!(transcript.resolve_exact(2_000), None);
        assert_eq!(transcript.resolve_exact(5_000), Some(1));
        assert_eq!(transcript.resolve_exact(8_000), None);
    }

    #[test]
    fn overlapping_segments_resolve_to_first_in_list_order() {
        let transcript = Transcript::new(vec![
            segment(0, 4_000, "long"),
            segment(2_000, 3_000, "inner"),
        ]);

        assert_eq!(transcript.resolve_exact(2_500), Some(0));
        assert_eq!(transcript.resolve_exact(3_500), Some(0));
    }

    #[test]
    fn gap_aware_rule_keeps_previous_line_in_a_gap() {
        let transcript = gapped();

        assert_eq!(transcript.resolve_exact(3_000), None);
        assert_eq!(transcript.resolve_gap_aware(3_000), Some(0));
        assert_eq!(transcript.resolve_gap_aware(6_000), Some(1));
        assert_eq!(transcript.resolve_gap_aware(9_000), Some(1));
    }

    #[test]
    fn gap_aware_rule_before_first_segment_is_none() {
        let transcript = Transcript::new(vec![segment(1_000, 2_000, "late start")]);

        assert_eq!(transcript.resolve_gap_aware(500), None);
    }

    #[test]
    fn zero_width_segments_are_never_active() {
        let transcript = Transcript::new(vec![
            segment(0, 1_000, "a"),
            segment(2_000, 2_000, "empty"),
            segment(3_000, 1_000, "inverted"),
        ]);

        assert_eq!(transcript.resolve_exact(2_000), None);
        assert_eq!(transcript.resolve_gap_aware(2_500), Some(0));
        assert_eq!(transcript.resolve_gap_aware(3_500), Some(0));
    }

    #[test]
    fn empty_transcript_never_resolves() {
        let transcript = Transcript::empty();

        assert_eq!(transcript.segment_at(0), None);
        assert_eq!(transcript.resolve_gap_aware(10_000), None);
    }

    #[test]
    fn equal_starts_prefer_the_later_segment() {
        let transcript = Transcript::new(vec![
            segment(0, 500, "a"),
            segment(0, 800, "b"),
        ]);

        assert_eq!(
            transcript
                .last_segment_starting_before_or_at(900)
                .map(|segment| segment.index),
            Some(1)
        );
    }

    #[test]
    fn parses_text_and_numeric_times() {
        let transcript = Transcript::from_json_str(
            r#"{
                "segments": [
                    { "text": "Hello", "speaker": "Anna", "translation": "Hallo",
                      "startTime": "00:00:00.00", "endTime": "00:00:02.50" },
                    { "text": "Narration", "startTime": 2.5, "endTime": 4.0 }
                ]
            }"#,
        )
        .expect("document should parse");

        assert_eq!(transcript.len(), 2);
        let first = transcript.get(0).expect("first segment");
        assert_eq!(first.end_ms, 2_500);
        assert_eq!(first.translation(), Some("Hallo"));
        let second = transcript.get(1).expect("second segment");
        assert_eq!(second.index, 1);
        assert!(second.is_narration());
        assert_eq!((second.start_ms, second.end_ms), (2_500, 4_000));
    }

    #[test]
    fn malformed_time_fails_the_whole_document() {
        let result = Transcript::from_json_str(
            r#"{ "segments": [ { "text": "x", "startTime": "0:00", "endTime": "00:00:01" } ] }"#,
        );

        let error = result.expect_err("bad timestamp must be rejected");
        assert!(error.to_string().contains("0:00"));
    }

    #[test]
    fn normalization_strips_annotations_and_clips_overlaps() {
        let transcript = Transcript::new(vec![
            segment(0, 3_000, "[music]  Welcome   back"),
            segment(2_000, 4_000, "[applause]"),
            segment(2_500, 6_000, "Let's start"),
        ]);

        let normalized = transcript.normalized();

        assert_eq!(normalized.len(), 2);
        let first = normalized.get(0).expect("first");
        assert_eq!(first.text, "Welcome back");
        assert_eq!(first.end_ms, 2_000, "clipped against the dropped annotation");
        assert_eq!(normalized.get(1).expect("second").index, 1);
    }

    #[test]
    fn document_round_trip_writes_centisecond_times() {
        let transcript = Transcript::new(vec![segment(62_500, 64_000, "line")]);

        let json = serde_json::to_string(&transcript.to_document()).expect("serialize");

        assert!(json.contains(r#""startTime":"00:01:02.50""#));
        assert_eq!(
            Transcript::from_json_str(&json).expect("reparse"),
            transcript
        );
    }
}
