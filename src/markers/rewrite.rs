//! Marker rewriter
//!
//! Turns an unbound marker into its bound form `<opener><gap>codemeta[ID]` in
//! one edit. Two entry points:
//! - [`observe_edit`]: the edit-observation path. Reacts only to the
//!   activation gesture (a single space or underscore typed right at the end
//!   of an unbound marker).
//! - [`bind_line`]: explicit "create fragment at line". Binds an unbound
//!   marker or resolves the fragment of a bound one.
//!
//! Every edit this module issues runs under the session's suppression guard,
//! so the edit observed back from the buffer is ignored.

use log::{debug, info};
use serde::Deserialize;

use crate::core::error::Result;
use crate::core::session::Session;
use crate::markers::grammar::{scan_line, Keyword, MarkerMatch};
use crate::store::fragment::Ensured;

/// Characters that activate a marker when typed at its end
pub const TRIGGER_CHARS: [&str; 2] = [" ", "_"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditReason {
    #[default]
    Typing,
    Undo,
    Redo,
}

/// One replaced range, in pre-change coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    /// 0-based line index
    pub line: usize,
    /// Byte offset of the change in the pre-change line
    pub column: usize,
    /// Bytes removed at `column`
    pub removed: usize,
    pub text: String,
}

impl ContentChange {
    pub fn insert(line: usize, column: usize, text: impl Into<String>) -> Self {
        Self {
            line,
            column,
            removed: 0,
            text: text.into(),
        }
    }
}

/// A change notification, delivered after the buffer already holds the edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditEvent {
    pub reason: EditReason,
    pub changes: Vec<ContentChange>,
}

impl EditEvent {
    pub fn typing(change: ContentChange) -> Self {
        Self {
            reason: EditReason::Typing,
            changes: vec![change],
        }
    }
}

/// Replace bytes `start..end` of one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub line: usize,
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

/// The document being edited
pub trait TextBuffer {
    fn line(&self, index: usize) -> Option<&str>;
    fn apply(&mut self, edit: &TextEdit) -> Result<()>;
}

/// Why an observed edit caused nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// Issued by this engine
    SelfEdit,
    UndoRedo,
    /// Not the activation gesture
    NotTrigger,
    NoMarker,
}

impl Ignored {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ignored::SelfEdit => "self-edit",
            Ignored::UndoRedo => "undo-redo",
            Ignored::NotTrigger => "not-trigger",
            Ignored::NoMarker => "no-marker",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Ignored(Ignored),
    /// A fresh ID was allocated and written into the line
    Bound {
        id: String,
        edit: TextEdit,
        fragment: Ensured,
    },
    /// The marker already carried an ID; nothing was rewritten
    AlreadyBound { id: String, fragment: Ensured },
}

/// React to one change notification
pub fn observe_edit(
    session: &Session,
    buffer: &mut dyn TextBuffer,
    event: &EditEvent,
) -> Result<Reaction> {
    if session.is_suppressing_self_edits() {
        return Ok(Reaction::Ignored(Ignored::SelfEdit));
    }
    if event.reason != EditReason::Typing {
        return Ok(Reaction::Ignored(Ignored::UndoRedo));
    }
    let [change] = event.changes.as_slice() else {
        return Ok(Reaction::Ignored(Ignored::NotTrigger));
    };
    if change.removed != 0 || !TRIGGER_CHARS.contains(&change.text.as_str()) {
        return Ok(Reaction::Ignored(Ignored::NotTrigger));
    }

    let Some(current) = buffer.line(change.line) else {
        return Ok(Reaction::Ignored(Ignored::NotTrigger));
    };
    let Some(previous) = pre_change_line(current, change) else {
        return Ok(Reaction::Ignored(Ignored::NotTrigger));
    };
    let Some(marker) = scan_line(&previous) else {
        return Ok(Reaction::Ignored(Ignored::NoMarker));
    };
    if marker.is_bound() || marker.end != change.column {
        return Ok(Reaction::Ignored(Ignored::NotTrigger));
    }

    debug!(
        "activation gesture {:?} on line {}",
        change.text,
        change.line + 1
    );
    // A typed space stays after the bracket; an underscore is consumed.
    let consumed = if change.text == "_" { 1 } else { 0 };
    bind_marker(session, buffer, change.line, &marker, consumed)
}

/// Bind the marker on `line` (0-based), or resolve its fragment when bound
pub fn bind_line(session: &Session, buffer: &mut dyn TextBuffer, line: usize) -> Result<Reaction> {
    let Some(marker) = buffer.line(line).and_then(scan_line) else {
        return Ok(Reaction::Ignored(Ignored::NoMarker));
    };

    if let Some(id) = marker.id.clone() {
        let store = session.store("open fragment")?;
        let fragment = match store.locate(&id) {
            Some(path) => Ensured {
                path,
                created: false,
            },
            None => store.ensure(session.active_set(), &id)?,
        };
        return Ok(Reaction::AlreadyBound { id, fragment });
    }

    bind_marker(session, buffer, line, &marker, 0)
}

fn bind_marker(
    session: &Session,
    buffer: &mut dyn TextBuffer,
    line: usize,
    marker: &MarkerMatch,
    consumed: usize,
) -> Result<Reaction> {
    let store = session.store("create fragment")?;
    let id = session.allocator().allocate(store)?;

    let current = buffer.line(line).unwrap_or_default();
    let edit = TextEdit {
        line,
        start: marker.start,
        end: marker.end + consumed,
        replacement: canonical_form(marker, current, &id),
    };
    {
        let _guard = session.suppress_self_edits();
        buffer.apply(&edit)?;
    }

    let fragment = store.ensure(session.active_set(), &id)?;
    info!("bound marker on line {} to {}", line + 1, id);
    Ok(Reaction::Bound { id, edit, fragment })
}

/// `<opener><gap>codemeta[<id>]`, keeping the opener and spacing as written
pub fn canonical_form(marker: &MarkerMatch, line: &str, id: &str) -> String {
    format!(
        "{}{}{}[{}]",
        marker.opener,
        marker.gap(line),
        Keyword::Codemeta.as_str(),
        id
    )
}

/// Undo a single insertion to recover the line as it was before the keystroke
fn pre_change_line(current: &str, change: &ContentChange) -> Option<String> {
    let end = change.column.checked_add(change.text.len())?;
    if current.get(change.column..end)? != change.text {
        return None;
    }
    Some(format!("{}{}", &current[..change.column], &current[end..]))
}

/// A text document held as lines, each remembering its own terminator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
    /// `"\r\n"`, `"\n"`, or empty for a final unterminated line
    endings: Vec<&'static str>,
}

impl LineBuffer {
    pub fn from_text(text: &str) -> Self {
        let mut buffer = Self::default();
        for chunk in text.split_inclusive('\n') {
            let (line, eol) = if let Some(line) = chunk.strip_suffix("\r\n") {
                (line, "\r\n")
            } else if let Some(line) = chunk.strip_suffix('\n') {
                (line, "\n")
            } else {
                (chunk, "")
            };
            buffer.lines.push(line.to_string());
            buffer.endings.push(eol);
        }
        buffer
    }

    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .zip(&self.endings)
            .fold(String::new(), |mut text, (line, eol)| {
                text.push_str(line);
                text.push_str(eol);
                text
            })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Insert text as a keystroke would, returning the matching notification
    pub fn type_text(&mut self, line: usize, column: usize, text: &str) -> Option<EditEvent> {
        let target = self.lines.get_mut(line)?;
        if !target.is_char_boundary(column) || column > target.len() {
            return None;
        }
        target.insert_str(column, text);
        Some(EditEvent::typing(ContentChange::insert(line, column, text)))
    }
}

impl TextBuffer for LineBuffer {
    fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    fn apply(&mut self, edit: &TextEdit) -> Result<()> {
        if let Some(target) = self.lines.get_mut(edit.line) {
            let end = edit.end.min(target.len());
            let start = edit.start.min(end);
            target.replace_range(start..end, &edit.replacement);
        }
        Ok(())
    }
}
