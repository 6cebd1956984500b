//! Marker grammar
//!
//! A marker is a comment opener, optional whitespace, then a keyword:
//! `//codemeta`, `# codemeta`, `<!-- codemeta`, `/* codemeta`, or the
//! deprecated `cm` abbreviation in the same positions. An optional ID follows:
//! `[123]` (canonical) or ` 123` (legacy, read-only).
//!
//! Matching rule: keywords are tried in priority order (`codemeta` before
//! `cm`); within one keyword the earliest start offset wins. A keyword must
//! not run on into another letter or digit, so `//cmake` is not a marker.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Comment openers a marker may follow
pub const OPENERS: [&str; 4] = ["//", "#", "<!--", "/*"];

/// Canonical ID form directly after the keyword: `[123]`
static CANONICAL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[(\d{1,32})\]").expect("Invalid CANONICAL_ID_RE regex"));

/// Legacy ID form: whitespace then digits
static LEGACY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+(\d{1,32})\b").expect("Invalid LEGACY_ID_RE regex"));

/// Marker keyword, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Keyword {
    Codemeta,
    /// Deprecated two-letter abbreviation
    Cm,
}

impl Keyword {
    pub const PRIORITY: [Keyword; 2] = [Keyword::Codemeta, Keyword::Cm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Codemeta => "codemeta",
            Keyword::Cm => "cm",
        }
    }
}

/// How the ID is attached to the marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStyle {
    /// `codemeta[123]`
    Bracket,
    /// `cm 123`
    Spaced,
}

/// A marker found on one line. Offsets are byte offsets into the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerMatch {
    /// Start of the comment opener
    pub start: usize,
    /// End of the keyword
    pub end: usize,
    pub opener: &'static str,
    pub keyword: Keyword,
    /// Bound ID; `None` means the marker is unbound
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_style: Option<IdStyle>,
    /// End of the ID text (closing bracket or last digit); equals `end` when unbound
    pub id_end: usize,
}

impl MarkerMatch {
    pub fn is_bound(&self) -> bool {
        self.id.is_some()
    }

    /// Uses a deprecated keyword or ID style
    pub fn is_legacy(&self) -> bool {
        self.keyword == Keyword::Cm || self.id_style == Some(IdStyle::Spaced)
    }

    /// Whitespace between opener and keyword, as written
    pub fn gap<'a>(&self, line: &'a str) -> &'a str {
        let gap_start = self.start + self.opener.len();
        let gap_end = self.end - self.keyword.as_str().len();
        &line[gap_start..gap_end]
    }
}

/// Locate the marker token on a line: `[start, end)` of opener + keyword
pub fn find_marker(line: &str) -> Option<(usize, usize, &'static str, Keyword)> {
    for keyword in Keyword::PRIORITY {
        let mut best: Option<(usize, usize, &'static str)> = None;
        for opener in OPENERS {
            for start in opener_positions(line, opener) {
                if best.is_some_and(|(b, _, _)| b <= start) {
                    break;
                }
                if let Some(end) = keyword_end(line, start + opener.len(), keyword) {
                    best = Some((start, end, opener));
                    break;
                }
            }
        }
        if let Some((start, end, opener)) = best {
            return Some((start, end, opener, keyword));
        }
    }
    None
}

/// Every offset where `opener` starts, overlapping occurrences included
fn opener_positions<'a>(line: &'a str, opener: &'a str) -> impl Iterator<Item = usize> + 'a {
    line.char_indices()
        .map(|(i, _)| i)
        .filter(move |&i| line[i..].starts_with(opener))
}

/// After an opener, skip whitespace and expect the keyword at a word boundary
fn keyword_end(line: &str, from: usize, keyword: Keyword) -> Option<usize> {
    let rest = &line[from..];
    let trimmed = rest.trim_start();
    let kw_start = from + (rest.len() - trimmed.len());
    let word = keyword.as_str();
    if !trimmed.starts_with(word) {
        return None;
    }
    let end = kw_start + word.len();
    match line[end..].chars().next() {
        Some(c) if c.is_ascii_alphanumeric() => None,
        _ => Some(end),
    }
}

/// Extract an ID from the text directly after a marker keyword
pub fn extract_id(after_marker: &str) -> Option<(String, IdStyle, usize)> {
    if let Some(caps) = CANONICAL_ID_RE.captures(after_marker) {
        let whole = caps.get(0)?;
        return Some((caps[1].to_string(), IdStyle::Bracket, whole.end()));
    }
    let caps = LEGACY_ID_RE.captures(after_marker)?;
    let whole = caps.get(0)?;
    Some((caps[1].to_string(), IdStyle::Spaced, whole.end()))
}

/// Scan one line for a marker and its optional ID
pub fn scan_line(line: &str) -> Option<MarkerMatch> {
    let (start, end, opener, keyword) = find_marker(line)?;
    let (id, id_style, id_end) = match extract_id(&line[end..]) {
        Some((id, style, len)) => (Some(id), Some(style), end + len),
        None => (None, None, end),
    };
    Some(MarkerMatch {
        start,
        end,
        opener,
        keyword,
        id,
        id_style,
        id_end,
    })
}

/// Whether a string is a well-formed fragment ID (1-32 decimal digits)
pub fn is_valid_id(id: &str) -> bool {
    (1..=32).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_line_from_real_workspace() {
        let line = "//cm 5664210353 [Remove this]";
        let m = scan_line(line).unwrap();
        assert_eq!((m.start, m.end), (0, 4));
        assert_eq!(m.keyword, Keyword::Cm);
        assert_eq!(m.id.as_deref(), Some("5664210353"));
        assert_eq!(m.id_style, Some(IdStyle::Spaced));
        assert!(m.is_legacy());
        assert_eq!(&line[m.id_end..], " [Remove this]");
    }

    #[test]
    fn test_unbound_with_gap() {
        let m = scan_line("// codemeta").unwrap();
        assert_eq!((m.start, m.end), (0, 11));
        assert_eq!(m.keyword, Keyword::Codemeta);
        assert!(m.id.is_none());
        assert_eq!(m.gap("// codemeta"), " ");
    }

    #[test]
    fn test_canonical_bracket_id() {
        let line = "let x = 1; #codemeta[42] keep";
        let m = scan_line(line).unwrap();
        assert_eq!(m.start, 11);
        assert_eq!(m.opener, "#");
        assert_eq!(m.id.as_deref(), Some("42"));
        assert_eq!(m.id_style, Some(IdStyle::Bracket));
        assert!(!m.is_legacy());
        assert_eq!(&line[m.id_end..], " keep");
    }

    #[test]
    fn test_bracket_tolerates_leading_whitespace() {
        let m = scan_line("//codemeta  [7]").unwrap();
        assert_eq!(m.id.as_deref(), Some("7"));
        assert_eq!(m.id_style, Some(IdStyle::Bracket));
    }

    #[test]
    fn test_html_and_block_openers() {
        let m = scan_line("<!-- codemeta[3] -->").unwrap();
        assert_eq!(m.opener, "<!--");
        assert_eq!(m.id.as_deref(), Some("3"));

        let m = scan_line("/*cm 12*/").unwrap();
        assert_eq!(m.opener, "/*");
        assert_eq!(m.keyword, Keyword::Cm);
        assert_eq!(m.id.as_deref(), Some("12"));
    }

    #[test]
    fn test_canonical_keyword_preferred_over_earlier_abbreviation() {
        let line = "#cm 1 //codemeta[2]";
        let m = scan_line(line).unwrap();
        assert_eq!(m.keyword, Keyword::Codemeta);
        assert_eq!(m.start, 6);
        assert_eq!(m.id.as_deref(), Some("2"));
    }

    #[test]
    fn test_earliest_offset_within_keyword() {
        let m = scan_line("# codemeta[1] // codemeta[2]").unwrap();
        assert_eq!(m.start, 0);
        assert_eq!(m.id.as_deref(), Some("1"));
    }

    #[test]
    fn test_word_boundary() {
        assert!(scan_line("//cmake_minimum_required").is_none());
        assert!(scan_line("# codemetadata").is_none());
        let m = scan_line("//cmake //cm 9").unwrap();
        assert_eq!(m.start, 8);
        assert_eq!(m.id.as_deref(), Some("9"));
    }

    #[test]
    fn test_underscore_trigger_still_a_marker() {
        let m = scan_line("//codemeta_").unwrap();
        assert_eq!(m.end, 10);
        assert!(m.id.is_none());
    }

    #[test]
    fn test_triple_slash_starts_at_inner_opener() {
        let m = scan_line("///codemeta[5]").unwrap();
        assert_eq!(m.start, 1);
        assert_eq!(m.opener, "//");
    }

    #[test]
    fn test_no_marker() {
        assert!(scan_line("plain text").is_none());
        assert!(scan_line("codemeta[1] without opener").is_none());
        assert!(scan_line("").is_none());
    }

    #[test]
    fn test_id_longer_than_32_digits_is_unbound() {
        let line = format!("//cm {}", "1".repeat(33));
        let m = scan_line(&line).unwrap();
        assert!(m.id.is_none());

        let line = format!("//codemeta[{}]", "1".repeat(33));
        assert!(scan_line(&line).unwrap().id.is_none());
    }

    #[test]
    fn test_legacy_needs_whitespace() {
        assert!(scan_line("//cm").unwrap().id.is_none());
        assert!(scan_line("//cm 12abc").unwrap().id.is_none());
    }

    #[test]
    fn test_scan_is_idempotent() {
        let lines = [
            "//cm 5664210353 [Remove this]",
            "// codemeta",
            "<!-- codemeta[9] -->",
            "x = 1 # cm 123456",
        ];
        for line in lines {
            assert_eq!(scan_line(line), scan_line(line));
        }
    }

    #[test]
    fn test_multibyte_prefix_offsets_are_bytes() {
        let line = "é //codemeta[1]";
        let m = scan_line(line).unwrap();
        assert_eq!(m.start, 3);
        assert_eq!(&line[m.start..m.end], "//codemeta");
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("0"));
        assert!(is_valid_id(&"9".repeat(32)));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id(&"9".repeat(33)));
        assert!(!is_valid_id("12a"));
    }
}
