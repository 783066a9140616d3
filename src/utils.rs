use chrono::{DateTime, Local};

/// Eight hex characters taken from a random UUID. Used as the terminal
/// session id in logs and the audit trail.
pub fn new_session_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Timestamp format used in logs and report rows.
pub fn format_timestamp(ts: &DateTime<Local>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Cut `text` to at most `max` characters, replacing the tail with "..."
/// when it does not fit.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Truncate a line to at most `max` bytes on a char boundary.
pub fn clamp_line(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while end > 0 && !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

/// Session length for the logout message: "45s", "2m 5s", "1h 30m".
/// A zero trailing unit is left out.
pub fn format_duration(secs: u64) -> String {
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    match (hours, minutes, seconds) {
        (0, 0, s) => format!("{}s", s),
        (0, m, 0) => format!("{}m", m),
        (0, m, s) => format!("{}m {}s", m, s),
        (h, 0, _) => format!("{}h", h),
        (h, m, _) => format!("{}h {}m", h, m),
    }
}
