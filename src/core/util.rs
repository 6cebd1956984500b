//! Common utilities

use chrono::{SecondsFormat, Utc};

/// Current time as an ISO-8601 UTC timestamp with millisecond precision
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Keep at most `max_lines` lines and `max_chars` characters, marking the cut with an ellipsis
pub fn truncate_lines(text: &str, max_lines: usize, max_chars: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = lines
        .iter()
        .take(max_lines)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>();
        out.truncate(out.trim_end().len());
    }

    if lines.len() > max_lines || text.chars().count() > max_chars {
        out.push_str("\n\n…");
    }
    out
}

/// Shorten a single line to `max_chars` characters, ending in an ellipsis
pub fn shorten(line: &str, max_chars: usize) -> String {
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let mut out: String = line.chars().take(max_chars.saturating_sub(3)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso_shape() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_truncate_lines_short_text_untouched() {
        assert_eq!(truncate_lines("a\nb", 12, 600), "a\nb");
    }

    #[test]
    fn test_truncate_lines_by_line_count() {
        let text = (1..=15).map(|n| n.to_string()).collect::<Vec<_>>().join("\n");
        let out = truncate_lines(&text, 12, 600);
        assert!(out.starts_with("1\n2"));
        assert!(out.contains("\n12\n\n…"));
        assert!(!out.contains("13"));
    }

    #[test]
    fn test_truncate_lines_by_chars() {
        let text = "x".repeat(700);
        let out = truncate_lines(&text, 12, 600);
        assert_eq!(out.chars().count(), 603);
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("short", 120), "short");
        let long = "y".repeat(130);
        let out = shorten(&long, 120);
        assert_eq!(out.chars().count(), 118);
        assert!(out.ends_with('…'));
    }
}
