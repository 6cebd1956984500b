//! Decoration feed for editor integrations
//!
//! For each marker line of a document: the marker span, its bound ID, the
//! fragment category and previews, and the configured category style. The
//! feed is computed on demand; when to recompute is up to the consumer,
//! typically through a [`RefreshDebouncer`].

use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::core::config::{CategoryStyle, Config};
use crate::markers::grammar::scan_line;
use crate::store::fragment::FragmentStore;

/// Recommended delay between the last keystroke and a decoration refresh
pub const REFRESH_DELAY: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineDecoration {
    /// 1-based
    pub line: u32,
    /// Byte span of opener and keyword
    pub start: usize,
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub legacy: bool,
    /// `None` when unbound or when no fragment backs the ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<CategoryStyle>,
}

#[derive(Debug, Clone, Default)]
struct FragmentView {
    category: Option<String>,
    inline_preview: Option<String>,
    hover_preview: Option<String>,
}

/// Decorations for every marker line of `text`
pub fn decorate(text: &str, store: Option<&FragmentStore>, config: &Config) -> Vec<LineDecoration> {
    let mut views: HashMap<String, FragmentView> = HashMap::new();
    let mut decorations = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let Some(marker) = scan_line(line) else {
            continue;
        };
        let view = match (&marker.id, store) {
            (Some(id), Some(store)) => views
                .entry(id.clone())
                .or_insert_with(|| load_view(store, id))
                .clone(),
            _ => FragmentView::default(),
        };
        let style = view
            .category
            .as_deref()
            .and_then(|c| config.style_for(c))
            .cloned();

        decorations.push(LineDecoration {
            line: u32::try_from(index + 1).unwrap_or(u32::MAX),
            start: marker.start,
            end: marker.end,
            legacy: marker.is_legacy(),
            id: marker.id,
            category: view.category,
            inline_preview: view.inline_preview,
            hover_preview: view.hover_preview,
            style,
        });
    }
    decorations
}

fn load_view(store: &FragmentStore, id: &str) -> FragmentView {
    let Some(record) = store.locate(id).and_then(|path| store.read(&path).ok()) else {
        return FragmentView::default();
    };
    FragmentView {
        inline_preview: record.inline_preview(),
        hover_preview: record.hover_preview(),
        category: Some(record.category),
    }
}

/// Trailing-edge debounce: fires once, `delay` after the last touch
#[derive(Debug, Clone)]
pub struct RefreshDebouncer {
    delay: Duration,
    last_touch: Option<Instant>,
}

impl Default for RefreshDebouncer {
    fn default() -> Self {
        Self::new(REFRESH_DELAY)
    }
}

impl RefreshDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_touch: None,
        }
    }

    /// Record a change; restarts the quiet period
    pub fn touch(&mut self, now: Instant) {
        self.last_touch = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_touch.is_some()
    }

    /// True exactly once per burst, when the quiet period has elapsed
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.last_touch {
            Some(last) if now.saturating_duration_since(last) >= self.delay => {
                self.last_touch = None;
                true
            }
            _ => false,
        }
    }
}
