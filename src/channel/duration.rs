use regex::Regex;
use std::sync::OnceLock;

/// Parsed video length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDuration {
    pub total_seconds: u64,
    /// `MM:SS`, or `H:MM:SS` when there is an hour component
    pub clock: String,
}

fn duration_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").ok())
        .as_ref()
}

/// Parse an ISO-8601 duration such as `PT1H4M13S`.
pub fn parse_iso8601_duration(raw: &str) -> Option<VideoDuration> {
    let caps = duration_regex()?.captures(raw.trim())?;
    // Days, hours, minutes, seconds. A group too large for u64 rejects the input.
    let mut parts = [None; 4];
    for (slot, part) in parts.iter_mut().enumerate() {
        if let Some(m) = caps.get(slot + 1) {
            *part = Some(m.as_str().parse::<u64>().ok()?);
        }
    }
    let [days, hours, minutes, seconds] = parts;

    let has_hours = days.is_some() || hours.is_some();
    let total_seconds = days
        .unwrap_or(0)
        .checked_mul(86_400)?
        .checked_add(hours.unwrap_or(0).checked_mul(3600)?)?
        .checked_add(minutes.unwrap_or(0).checked_mul(60)?)?
        .checked_add(seconds.unwrap_or(0))?;

    // Overflowing minute or second components carry into the larger units.
    let (h, m, s) = (total_seconds / 3600, (total_seconds % 3600) / 60, total_seconds % 60);
    let clock = if has_hours || h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    };

    Some(VideoDuration { total_seconds, clock })
}
