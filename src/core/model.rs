//! Unified Result Model
//!
//! Every command maps its findings to this model before rendering output.

use serde::{Deserialize, Serialize};

/// The kind of result item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Marker,
    Fragment,
    Occurrence,
    Set,
    Id,
    Edit,
    Summary,
    Error,
}

/// Confidence level of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Source mode indicating how the result was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Full workspace scan
    Scan,
    /// Cached refs block in a fragment header
    Cache,
    /// Fragment store on disk
    Store,
    /// Allocator state
    State,
}

/// Line-based range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeLine {
    pub start: u32,
    pub end: u32,
}

/// Byte-based range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeByte {
    pub start: u64,
    pub end: u64,
}

/// Range can be either line-based or byte-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Range {
    Line(RangeLine),
    Byte(RangeByte),
}

impl Range {
    /// Create a new line range
    pub fn lines(start: u32, end: u32) -> Self {
        Range::Line(RangeLine { start, end })
    }
}

/// Metadata for a result item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    /// Fragment ID the item is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Category label of the fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Whether the content was truncated
    #[serde(default)]
    pub truncated: bool,
}

/// Error information for a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    pub code: String,
    pub message: String,
}

impl ItemError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The unified result item that all commands produce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    /// The kind of this result
    pub kind: Kind,

    /// Path relative to root, using '/' as separator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Range within the file (line or byte based)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,

    /// Excerpt of the content (may be truncated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,

    /// Structured payload (marker span, created flag, counts, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Confidence level
    pub confidence: Confidence,

    /// How this result was obtained
    pub source_mode: SourceMode,

    /// Metadata
    pub meta: Meta,

    /// Errors (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ItemError>,
}

impl ResultItem {
    fn new(kind: Kind, source_mode: SourceMode) -> Self {
        Self {
            kind,
            path: None,
            range: None,
            excerpt: None,
            data: None,
            confidence: Confidence::High,
            source_mode,
            meta: Meta::default(),
            errors: Vec::new(),
        }
    }

    /// A marker found on a line of a source file
    pub fn marker(path: impl Into<String>, line: u32) -> Self {
        let mut item = Self::new(Kind::Marker, SourceMode::Scan);
        item.path = Some(path.into());
        item.range = Some(Range::lines(line, line));
        item
    }

    /// A fragment record in the store
    pub fn fragment(path: impl Into<String>, id: impl Into<String>) -> Self {
        let mut item = Self::new(Kind::Fragment, SourceMode::Store);
        item.path = Some(path.into());
        item.meta.id = Some(id.into());
        item
    }

    /// A `(file, line)` occurrence of a bound marker
    pub fn occurrence(path: impl Into<String>, line: u32, id: impl Into<String>) -> Self {
        let mut item = Self::new(Kind::Occurrence, SourceMode::Scan);
        item.path = Some(path.into());
        item.range = Some(Range::lines(line, line));
        item.meta.id = Some(id.into());
        item
    }

    /// A fragment set
    pub fn set(path: impl Into<String>) -> Self {
        let mut item = Self::new(Kind::Set, SourceMode::Store);
        item.path = Some(path.into());
        item
    }

    /// An allocated identifier
    pub fn id(id: impl Into<String>) -> Self {
        let mut item = Self::new(Kind::Id, SourceMode::State);
        item.meta.id = Some(id.into());
        item
    }

    /// A text edit applied (or proposed) to a file
    pub fn edit(path: impl Into<String>, line: u32, replacement: impl Into<String>) -> Self {
        let mut item = Self::new(Kind::Edit, SourceMode::Scan);
        item.path = Some(path.into());
        item.range = Some(Range::lines(line, line));
        item.excerpt = Some(replacement.into());
        item
    }

    /// A rendered summary document
    pub fn summary(path: impl Into<String>, content: impl Into<String>) -> Self {
        let mut item = Self::new(Kind::Summary, SourceMode::Scan);
        item.path = Some(path.into());
        item.excerpt = Some(content.into());
        item
    }

    /// Create a new error result
    pub fn error(error: ItemError) -> Self {
        let mut item = Self::new(Kind::Error, SourceMode::Scan);
        item.errors.push(error);
        item
    }

    /// Set metadata
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    /// Set the category label
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.meta.category = Some(category.into());
        self
    }

    /// Set confidence level
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set source mode
    pub fn with_source_mode(mut self, source_mode: SourceMode) -> Self {
        self.source_mode = source_mode;
        self
    }

    /// Set excerpt
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    /// Set structured data payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Result set containing multiple result items
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub items: Vec<ResultItem>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: ResultItem) {
        self.items.push(item);
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = ResultItem>) {
        self.items.extend(items);
    }

    /// Sort items by path and range start for stable output
    pub fn sort(&mut self) {
        self.items.sort_by(|a, b| match (&a.path, &b.path) {
            (Some(pa), Some(pb)) => {
                let path_cmp = pa.cmp(pb);
                if path_cmp != std::cmp::Ordering::Equal {
                    return path_cmp;
                }
                match (&a.range, &b.range) {
                    (Some(Range::Line(ra)), Some(Range::Line(rb))) => ra.start.cmp(&rb.start),
                    (Some(Range::Byte(ra)), Some(Range::Byte(rb))) => ra.start.cmp(&rb.start),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    _ => std::cmp::Ordering::Equal,
                }
            }
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultItem;
    type IntoIter = std::vec::IntoIter<ResultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<ResultItem> for ResultSet {
    fn from_iter<T: IntoIterator<Item = ResultItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
