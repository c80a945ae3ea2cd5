//! Human-facing time strings: `MM:SS` / `HH:MM:SS` formatting and parsing.

/// Formats whole seconds as `MM:SS`, or `HH:MM:SS` once an hour is reached.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Parses `SS`, `MM:SS` or `HH:MM:SS` into seconds.
///
/// A trailing colon is tolerated (`"1:30:"`). Negative components, empty
/// components and more than three parts are rejected.
pub fn parse_time(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed.contains(':') {
        return trimmed.parse::<u64>().ok();
    }

    let trimmed = trimmed.trim_end_matches(':');
    let parts = trimmed
        .split(':')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    // Out-of-range values are malformed rather than wrapped.
    match parts.as_slice() {
        [m, s] => m.checked_mul(60)?.checked_add(*s),
        [h, m, s] => h
            .checked_mul(3600)?
            .checked_add(m.checked_mul(60)?)?
            .checked_add(*s),
        _ => None,
    }
}

/// Text progress bar used by the now-playing view.
pub fn progress_bar(current: u64, total: u64, length: usize) -> String {
    if total == 0 || length == 0 {
        return "─".repeat(length);
    }
    let progress = (current as f64 / total as f64).min(1.0);
    let filled = ((length as f64) * progress) as usize;
    let filled = filled.min(length - 1);
    format!(
        "{}○{}",
        "━".repeat(filled),
        "─".repeat(length - filled - 1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(75), "01:15");
        assert_eq!(format_duration(3600), "01:00:00");
        assert_eq!(format_duration(3725), "01:02:05");
    }

    #[test]
    fn test_parse_plain_seconds() {
        assert_eq!(parse_time("90"), Some(90));
        assert_eq!(parse_time("  42 "), Some(42));
    }

    #[test]
    fn test_parse_colon_forms() {
        assert_eq!(parse_time("1:30"), Some(90));
        assert_eq!(parse_time("1:02:03"), Some(3723));
        assert_eq!(parse_time("1:30:"), Some(90));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("abc"), None);
        assert_eq!(parse_time("-5"), None);
        assert_eq!(parse_time("1:-5"), None);
        assert_eq!(parse_time("1:2:3:4"), None);
        assert_eq!(parse_time("1::3"), None);
    }

    #[test]
    fn test_parse_rejects_overflowing_values() {
        assert_eq!(parse_time("5124095576030432:0:0"), None);
        assert_eq!(parse_time("307445734561825861:0"), None);
        assert_eq!(parse_time("0:307445734561825861:0"), None);
        assert_eq!(parse_time("5124095576030431:0:0"), Some(5_124_095_576_030_431 * 3600));
        assert_eq!(parse_time("99999999999999999999"), None);
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0, 0, 5), "─────");
        assert_eq!(progress_bar(0, 100, 5), "○────");
        assert_eq!(progress_bar(50, 100, 4), "━━○─");
        assert_eq!(progress_bar(100, 100, 4), "━━━○");
    }
}
