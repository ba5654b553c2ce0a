//! Start-time normalization shared by transcript ingestion and display.
//!
//! Providers encode segment offsets either in seconds or in milliseconds and
//! under different field names. Everything downstream works in whole seconds.

use serde_json::Value;

/// Values above this are taken to be milliseconds.
pub const MILLIS_THRESHOLD: f64 = 10_000.0;

/// Field names carrying a segment start time, tried in order.
const START_FIELDS: [&str; 5] = ["start", "startTime", "start_time", "offset", "s"];

/// Normalize a raw offset of unknown unit into whole seconds.
pub fn normalize_seconds(raw: f64) -> u64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    let seconds = if raw > MILLIS_THRESHOLD { raw / 1000.0 } else { raw };
    seconds.floor() as u64
}

/// Normalize a JSON value. Numeric strings are accepted, anything else is 0.
pub fn normalize_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_f64().map(normalize_seconds).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(normalize_seconds).unwrap_or(0),
        _ => 0,
    }
}

/// Start time of a transcript segment, read from the first present alias.
pub fn segment_start_seconds(segment: &Value) -> u64 {
    START_FIELDS
        .iter()
        .filter_map(|field| segment.get(*field))
        .find(|value| !value.is_null())
        .map(normalize_value)
        .unwrap_or(0)
}

/// Clock string for already-normalized seconds: `M:SS`, or `H:MM:SS` from one hour.
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Embeddable player URL seeking to an already-normalized offset.
pub fn embed_url(video_id: &str, seconds: Option<u64>) -> String {
    match seconds {
        Some(start) if start > 0 => format!(
            "https://www.youtube.com/embed/{}?start={}&autoplay=1",
            video_id, start
        ),
        _ => format!("https://www.youtube.com/embed/{}", video_id),
    }
}
