//! Fragment record format
//!
//! ```text
//! ---
//! id: 42
//! created: 2025-01-01T00:00:00.000Z
//! category: INFO
//! refs: |
//!   3@src/a.ts
//!   1@src/b.ts
//! ---
//!
//! free text body
//! ```
//!
//! The header is an ordered list of `key: value` pairs plus one multi-line
//! `refs` block of `<count>@<relative path>` entries. Parsing never fails:
//! lines that do not fit are dropped and missing fields fall back to defaults.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

pub const DELIMITER: &str = "---";
pub const REFS_KEY: &str = "refs";

static REF_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)@(.+)$").expect("Invalid REF_ENTRY_RE regex"));

/// Cached reference counts keyed by relative path
pub type RefEntries = BTreeMap<String, u32>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<(String, String)>,
    refs: RefEntries,
}

impl Header {
    /// Header written for a freshly created fragment
    pub fn initial(id: &str, created: &str, category: &str) -> Self {
        let mut header = Self::default();
        header.set("id", id);
        header.set("created", created);
        header.set("category", category);
        header
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the first field named `key`, or append it
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    /// Category label, or `default` when absent or blank
    pub fn category_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.get("category").map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => default,
        }
    }

    pub fn references(&self) -> &RefEntries {
        &self.refs
    }

    /// Sum of all cached counts
    pub fn reference_total(&self) -> u64 {
        self.refs.values().map(|&c| u64::from(c)).sum()
    }

    /// Merge one observation: a positive count upserts, zero or less removes
    pub fn merge_reference(&mut self, path: &str, count: i64) {
        if count > 0 {
            let count = u32::try_from(count).unwrap_or(u32::MAX);
            self.refs.insert(path.to_string(), count);
        } else {
            self.refs.remove(path);
        }
    }

    /// Replace the whole refs block
    pub fn replace_references(&mut self, refs: RefEntries) {
        self.refs = refs.into_iter().filter(|(_, c)| *c > 0).collect();
    }

    fn parse(lines: &[&str]) -> Self {
        let mut header = Self::default();
        let mut in_refs = false;

        for raw in lines {
            let line = raw.trim_end_matches('\r');
            let indented = line.starts_with(' ') || line.starts_with('\t');

            if in_refs && indented {
                match REF_ENTRY_RE.captures(line.trim()) {
                    Some(caps) => match caps[1].parse::<u32>() {
                        Ok(count) if count > 0 => {
                            header.refs.insert(caps[2].trim().to_string(), count);
                        }
                        _ => debug!("header: dropping refs entry {:?}", line),
                    },
                    None => debug!("header: dropping refs entry {:?}", line),
                }
                continue;
            }
            in_refs = false;

            if line.trim().is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                debug!("header: ignoring line without key {:?}", line);
                continue;
            };
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                debug!("header: ignoring malformed key in {:?}", line);
                continue;
            }

            if key == REFS_KEY {
                in_refs = true;
                continue;
            }
            header.fields.push((key.to_string(), value.trim().to_string()));
        }

        header
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(DELIMITER);
        out.push('\n');
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push(':');
            if !value.is_empty() {
                out.push(' ');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.refs.is_empty() {
            out.push_str(REFS_KEY);
            out.push_str(": |\n");
            for (path, count) in &self.refs {
                out.push_str(&format!("  {}@{}\n", count, path));
            }
        }
        out.push_str(DELIMITER);
        out.push('\n');
    }
}

/// A fragment file split into header and body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentDocument {
    pub header: Option<Header>,
    pub body: String,
    /// Zero-based line after the closing delimiter
    content_start: usize,
}

impl FragmentDocument {
    pub fn new(header: Header, body: impl Into<String>) -> Self {
        let mut rendered = String::new();
        header.write_to(&mut rendered);
        Self {
            content_start: rendered.lines().count(),
            header: Some(header),
            body: body.into(),
        }
    }

    pub fn parse(text: &str) -> Self {
        let mut lines = text.split_inclusive('\n');
        let Some(first) = lines.next() else {
            return Self::default();
        };
        if first.trim() != DELIMITER {
            return Self::headerless(text);
        }

        let mut header_lines = Vec::new();
        let mut consumed = first.len();
        let mut closing = None;
        for (index, line) in lines.by_ref().enumerate() {
            consumed += line.len();
            if line.trim() == DELIMITER {
                closing = Some(index + 1);
                break;
            }
            header_lines.push(line.trim_end_matches('\n'));
        }

        let Some(closing) = closing else {
            debug!("header: no closing delimiter, treating file as body");
            return Self::headerless(text);
        };

        let rest = &text[consumed..];
        let body = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);

        Self {
            header: Some(Header::parse(&header_lines)),
            body: body.to_string(),
            content_start: closing + 1,
        }
    }

    fn headerless(text: &str) -> Self {
        Self {
            header: None,
            body: text.to_string(),
            content_start: 0,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(header) = &self.header {
            header.write_to(&mut out);
            out.push('\n');
        }
        out.push_str(&self.body);
        out
    }

    /// Zero-based line following the closing `---`, as found in the file
    pub fn content_start_line(&self) -> usize {
        self.content_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---\nid: 7\ncreated: 2025-01-01T00:00:00.000Z\ncategory: TODO\nrefs: |\n  3@src/a.ts\n  1@src/b.ts\n---\n\nRemember this.\n";

    #[test]
    fn test_parse_sample() {
        let doc = FragmentDocument::parse(SAMPLE);
        let header = doc.header.as_ref().unwrap();
        assert_eq!(header.get("id"), Some("7"));
        assert_eq!(header.category_or("INFO"), "TODO");
        assert_eq!(header.references().get("src/a.ts"), Some(&3));
        assert_eq!(header.references().get("src/b.ts"), Some(&1));
        assert_eq!(header.reference_total(), 4);
        assert_eq!(doc.body, "Remember this.\n");
    }

    #[test]
    fn test_render_round_trip() {
        let doc = FragmentDocument::parse(SAMPLE);
        assert_eq!(doc.render(), SAMPLE);
    }

    #[test]
    fn test_initial_record_shape() {
        let doc = FragmentDocument::new(Header::initial("0", "2025-01-01T00:00:00.000Z", "INFO"), "");
        assert_eq!(
            doc.render(),
            "---\nid: 0\ncreated: 2025-01-01T00:00:00.000Z\ncategory: INFO\n---\n\n"
        );
        assert_eq!(FragmentDocument::parse(&doc.render()), doc);
    }

    #[test]
    fn test_remove_entry_keeps_block() {
        let mut doc = FragmentDocument::parse(SAMPLE);
        doc.header.as_mut().unwrap().merge_reference("src/b.ts", 0);
        let text = doc.render();
        assert!(text.contains("refs: |\n  3@src/a.ts\n---"));
        assert!(!text.contains("src/b.ts"));
    }

    #[test]
    fn test_remove_last_entry_drops_block() {
        let mut doc = FragmentDocument::parse(SAMPLE);
        let header = doc.header.as_mut().unwrap();
        header.merge_reference("src/b.ts", 0);
        header.merge_reference("src/a.ts", -2);
        let text = doc.render();
        assert!(!text.contains("refs"));
        assert!(text.starts_with("---\nid: 7\n"));
    }

    #[test]
    fn test_merge_writes_in_path_order() {
        let mut header = Header::initial("1", "t", "INFO");
        header.merge_reference("src/z.ts", 1);
        header.merge_reference("lib/a.ts", 2);
        header.merge_reference("src/m.ts", 5);
        let text = FragmentDocument::new(header, "").render();
        assert!(text.contains("refs: |\n  2@lib/a.ts\n  5@src/m.ts\n  1@src/z.ts\n"));
    }

    #[test]
    fn test_merge_round_trip_is_order_insensitive_on_read() {
        let text = "---\nid: 1\nrefs: |\n  1@b.ts\n  2@a.ts\n---\n\n";
        let doc = FragmentDocument::parse(text);
        let expected: RefEntries = [("a.ts".to_string(), 2), ("b.ts".to_string(), 1)]
            .into_iter()
            .collect();
        assert_eq!(doc.header.as_ref().unwrap().references(), &expected);

        let reread = FragmentDocument::parse(&doc.render());
        assert_eq!(reread.header.unwrap().references(), &expected);
    }

    #[test]
    fn test_malformed_lines_are_tolerated() {
        let text = "---\nid: 3\nnot a field\ncategory:\n: orphan\nrefs: |\n  x@a.ts\n  0@b.ts\n  2@c.ts\nextra key: v\n---\nbody";
        let doc = FragmentDocument::parse(text);
        let header = doc.header.unwrap();
        assert_eq!(header.get("id"), Some("3"));
        assert_eq!(header.category_or("INFO"), "INFO");
        assert_eq!(header.references().len(), 1);
        assert_eq!(header.references().get("c.ts"), Some(&2));
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn test_missing_header() {
        let doc = FragmentDocument::parse("just text\n");
        assert!(doc.header.is_none());
        assert_eq!(doc.body, "just text\n");
        assert_eq!(doc.render(), "just text\n");
    }

    #[test]
    fn test_unclosed_header_is_body() {
        let doc = FragmentDocument::parse("---\nid: 1\nno close");
        assert!(doc.header.is_none());
        assert_eq!(doc.body, "---\nid: 1\nno close");
    }

    #[test]
    fn test_crlf_header() {
        let doc = FragmentDocument::parse("---\r\nid: 4\r\ncategory: BUG\r\n---\r\n\r\nbody\r\n");
        let header = doc.header.as_ref().unwrap();
        assert_eq!(header.get("id"), Some("4"));
        assert_eq!(header.category_or("INFO"), "BUG");
        assert_eq!(doc.body, "body\r\n");
    }

    #[test]
    fn test_content_start_line() {
        let doc = FragmentDocument::parse(SAMPLE);
        assert_eq!(doc.content_start_line(), 8);
        assert_eq!(FragmentDocument::parse("no header").content_start_line(), 0);
    }

    #[test]
    fn test_content_start_follows_closing_delimiter() {
        let fresh = "---\nid: 0\ncreated: t\ncategory: INFO\n---\n\n";
        assert_eq!(FragmentDocument::parse(fresh).content_start_line(), 5);

        let initial = FragmentDocument::new(Header::initial("0", "t", "INFO"), "");
        assert_eq!(initial.content_start_line(), 5);

        // dropped header lines still count toward the file position
        let messy = "---\nid: 1\n\nnot a field\n: orphan\n---\nbody\n";
        let doc = FragmentDocument::parse(messy);
        assert_eq!(doc.content_start_line(), 6);
        assert_eq!(messy.lines().nth(doc.content_start_line()), Some("body"));
    }
}
