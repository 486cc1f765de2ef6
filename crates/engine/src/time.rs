use crate::error::{EngineError, Result};

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Converts player seconds into whole milliseconds with nearest rounding.
///
/// Negative and non-finite inputs collapse to `0`.
///
/// # Example
/// ```
/// use lesson_engine::time::seconds_to_ms;
///
/// assert_eq!(seconds_to_ms(62.5), 62_500);
/// assert_eq!(seconds_to_ms(-1.0), 0);
/// ```
pub fn seconds_to_ms(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * MS_PER_SECOND as f64).round() as u64
}

/// Converts milliseconds into the fractional seconds the player expects.
pub fn ms_to_seconds(ms: u64) -> f64 {
    ms as f64 / MS_PER_SECOND as f64
}

/// Parses a transcript timestamp `HH:MM:SS[.fff]` into milliseconds.
///
/// Minutes and seconds must be two zero-padded digits; hours use at least
/// two. Fractional digits past millisecond precision are truncated.
///
/// # Example
/// ```
/// use lesson_engine::time::parse_timestamp;
///
/// assert_eq!(parse_timestamp("00:01:02.5").expect("valid"), 62_500);
/// assert_eq!(parse_timestamp("01:00:00").expect("valid"), 3_600_000);
/// ```
pub fn parse_timestamp(input: &str) -> Result<u64> {
    let invalid = || EngineError::InvalidTimestamp {
        value: input.to_string(),
    };

    let mut parts = input.trim().split(':');
    let (Some(hours), Some(minutes), Some(seconds), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let (whole_seconds, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (seconds, None),
    };

    if hours.len() < 2 || minutes.len() != 2 || whole_seconds.len() != 2 {
        return Err(invalid());
    }
    let hours = parse_digits(hours).ok_or_else(invalid)?;
    let minutes = parse_digits(minutes).ok_or_else(invalid)?;
    let whole_seconds = parse_digits(whole_seconds).ok_or_else(invalid)?;
    if minutes >= 60 || whole_seconds >= 60 {
        return Err(invalid());
    }

    let millis = match fraction {
        None => 0,
        Some(fraction) => fraction_to_ms(fraction).ok_or_else(invalid)?,
    };

    hours
        .checked_mul(MS_PER_HOUR)
        .and_then(|total| total.checked_add(minutes * MS_PER_MINUTE))
        .and_then(|total| total.checked_add(whole_seconds * MS_PER_SECOND))
        .and_then(|total| total.checked_add(millis))
        .ok_or_else(invalid)
}

/// Formats milliseconds as `HH:MM:SS`, dropping the sub-second part.
///
/// # Example
/// ```
/// use lesson_engine::time::format_timestamp;
///
/// assert_eq!(format_timestamp(62_999), "00:01:02");
/// ```
pub fn format_timestamp(ms: u64) -> String {
    let total_seconds = ms / MS_PER_SECOND;
    let hours = total_seconds / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Formats milliseconds as `HH:MM:SS.ss`, the form transcript files are
/// written in. Rounds to the nearest centisecond.
pub fn format_timestamp_centis(ms: u64) -> String {
    let total_centis = (ms + 5) / 10;
    let hours = total_centis / 360_000;
    let minutes = (total_centis % 360_000) / 6_000;
    let seconds = (total_centis % 6_000) / 100;
    let centis = total_centis % 100;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{centis:02}")
}

fn parse_digits(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn fraction_to_ms(fraction: &str) -> Option<u64> {
    if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut millis = 0;
    for position in 0..3 {
        let digit = fraction
            .as_bytes()
            .get(position)
            .map(|byte| u64::from(byte - b'0'))
            .unwrap_or(0);
        millis = millis * 10 + digit;
    }
    Some(millis)
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, format_timestamp_centis, parse_timestamp, seconds_to_ms};

    #[test]
    fn fractional_seconds_are_scaled_to_millis() {
        assert_eq!(parse_timestamp("00:01:02.5").expect("valid"), 62_500);
        assert_eq!(parse_timestamp("00:00:03.25").expect("valid"), 3_250);
        assert_eq!(parse_timestamp("00:00:03.125").expect("valid"), 3_125);
        assert_eq!(parse_timestamp("00:00:03.1259").expect("valid"), 3_125);
    }

    #[test]
    fn formatting_then_parsing_keeps_whole_seconds() {
        for ms in [0, 1_000, 59_000, 61_000, 3_599_000, 3_600_000, 36_000_000] {
            let text = format_timestamp(ms);
            assert_eq!(parse_timestamp(&text).expect("formatted text parses"), ms);
        }
    }

    #[test]
    fn malformed_timestamps_are_rejected() {
        for input in [
            "", "1:02:03", "00:1:02", "00:01:2", "00:60:00", "00:00:60", "00:01", "00:00:01.",
            "00:00:0a", "00:00:01:00", "-0:00:01",
        ] {
            assert!(parse_timestamp(input).is_err(), "{input:?} should be rejected");
        }
    }

    #[test]
    fn wide_hours_are_accepted() {
        assert_eq!(parse_timestamp("100:00:00").expect("valid"), 360_000_000);
    }

    #[test]
    fn centisecond_format_rounds_and_carries() {
        assert_eq!(format_timestamp_centis(62_500), "00:01:02.50");
        assert_eq!(format_timestamp_centis(59_996), "00:01:00.00");
        assert_eq!(format_timestamp_centis(3_723_004), "01:02:03.00");
    }

    #[test]
    fn seconds_conversion_rounds_to_nearest_millisecond() {
        assert_eq!(seconds_to_ms(1.0004), 1_000);
        assert_eq!(seconds_to_ms(1.0006), 1_001);
        assert_eq!(seconds_to_ms(f64::NAN), 0);
    }
}
