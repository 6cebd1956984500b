//! Marker API - decoration feed, binding, edit observation and upgrade

use anyhow::{bail, Context, Result};
use log::debug;
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::file_reader::read_file_safe;
use crate::core::model::{Meta, ResultItem, ResultSet};
use crate::core::paths::display_relative;
use crate::core::render::{RenderConfig, Renderer};
use crate::core::session::Session;
use crate::decorations::{decorate, RefreshDebouncer};
use crate::markers::rewrite::{bind_line, observe_edit, EditReason, LineBuffer, Reaction, TextBuffer};
use crate::markers::upgrade::upgrade_workspace;
use crate::store::api::fragment_item;

/// Resolve a FILE argument against the workspace root
fn resolve(session: &Session, file: &Path) -> PathBuf {
    match session.root() {
        Some(root) if file.is_relative() => root.join(file),
        _ => file.to_path_buf(),
    }
}

fn display(session: &Session, path: &Path) -> String {
    match session.root() {
        Some(root) => display_relative(path, root),
        None => path.display().to_string(),
    }
}

fn load_buffer(path: &Path) -> Result<LineBuffer> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(LineBuffer::from_text(&text))
}

fn save_buffer(path: &Path, buffer: &LineBuffer) -> Result<()> {
    fs::write(path, buffer.to_text()).with_context(|| format!("Failed to write {}", path.display()))
}

fn decoration_items(session: &Session, rel: &str, text: &str) -> Vec<ResultItem> {
    let store = session.store("read fragments").ok();
    decorate(text, store, session.config())
        .into_iter()
        .map(|decoration| {
            let item = ResultItem::marker(rel, decoration.line).with_meta(Meta {
                id: decoration.id.clone(),
                category: decoration.category.clone(),
                truncated: false,
            });
            let item = match &decoration.inline_preview {
                Some(preview) => item.with_excerpt(preview),
                None => item,
            };
            item.with_data(serde_json::to_value(&decoration).unwrap_or_default())
        })
        .collect()
}

/// Decoration feed for one file
pub fn list_markers(session: &Session, file: &Path) -> Result<ResultSet> {
    let path = resolve(session, file);
    let read = read_file_safe(&path);
    let Some(text) = read.content else {
        bail!(
            "Cannot read {}: {}",
            path.display(),
            read.skip_reason.unwrap_or_default()
        );
    };

    let rel = display(session, &path);
    Ok(decoration_items(session, &rel, &text).into_iter().collect())
}

fn reaction_items(session: &Session, rel: &str, buffer: &LineBuffer, reaction: &Reaction) -> Result<Vec<ResultItem>> {
    let store = session.store("create fragment")?;
    Ok(match reaction {
        Reaction::Bound { id, edit, fragment } => {
            let line = u32::try_from(edit.line + 1).unwrap_or(u32::MAX);
            let text = buffer.line(edit.line).unwrap_or_default();
            vec![
                ResultItem::edit(rel, line, text)
                    .with_meta(Meta {
                        id: Some(id.clone()),
                        ..Meta::default()
                    })
                    .with_data(json!({ "reaction": "bound" })),
                fragment_item(session, store, id, fragment),
            ]
        }
        Reaction::AlreadyBound { id, fragment } => vec![fragment_item(session, store, id, fragment)],
        Reaction::Ignored(_) => Vec::new(),
    })
}

/// Bind the marker on a 1-based line, or open the fragment it is bound to
pub fn bind(session: &Session, file: &Path, line: usize) -> Result<ResultSet> {
    if line == 0 {
        bail!("Line numbers start at 1");
    }
    let path = resolve(session, file);
    let mut buffer = load_buffer(&path)?;
    let reaction = bind_line(session, &mut buffer, line - 1)?;
    if matches!(reaction, Reaction::Bound { .. }) {
        save_buffer(&path, &buffer)?;
    }
    let rel = display(session, &path);
    Ok(reaction_items(session, &rel, &buffer, &reaction)?.into_iter().collect())
}

/// Insert `text` at a 1-based line and character column of `buffer` and run
/// the resulting notification through the edit-observation path
fn apply_typed(
    session: &Session,
    buffer: &mut LineBuffer,
    line: usize,
    column: usize,
    text: &str,
    reason: EditReason,
) -> Result<Reaction> {
    if line == 0 || column == 0 {
        bail!("Line and column numbers start at 1");
    }
    let Some(current) = buffer.line(line - 1) else {
        bail!("No line {}", line);
    };
    let Some(offset) = byte_offset(current, column - 1) else {
        bail!("Line {} has no column {}", line, column);
    };
    let Some(mut event) = buffer.type_text(line - 1, offset, text) else {
        bail!("Cannot insert at line {} column {}", line, column);
    };
    event.reason = reason;

    Ok(observe_edit(session, buffer, &event)?)
}

/// Type `text` at a 1-based line and character column, then run the
/// resulting notification through the edit-observation path
pub fn type_text(
    session: &Session,
    file: &Path,
    line: usize,
    column: usize,
    text: &str,
    reason: EditReason,
) -> Result<ResultSet> {
    let path = resolve(session, file);
    let mut buffer = load_buffer(&path)?;
    let reaction = apply_typed(session, &mut buffer, line, column, text, reason)
        .with_context(|| format!("Cannot type into {}", path.display()))?;
    save_buffer(&path, &buffer)?;

    let rel = display(session, &path);
    let mut result_set = ResultSet::new();
    match &reaction {
        Reaction::Ignored(why) => {
            let current = buffer.line(line - 1).unwrap_or_default();
            result_set.push(
                ResultItem::edit(&rel, line as u32, current)
                    .with_data(json!({ "reaction": "ignored", "reason": why.as_str() })),
            );
        }
        _ => result_set.extend(reaction_items(session, &rel, &buffer, &reaction)?),
    }
    Ok(result_set)
}

/// One typed edit of a `feed` stream
#[derive(Debug, Deserialize)]
pub struct TypedEdit {
    pub line: usize,
    pub column: usize,
    pub text: String,
    #[serde(default)]
    pub reason: EditReason,
}

/// Replay a JSONL stream of typed edits against one file, the way an editor
/// session delivers keystrokes. Bound markers are reported as they happen;
/// decorations are re-emitted once per burst, after the refresh delay or at
/// the end of the stream.
pub fn feed(
    session: &Session,
    file: &Path,
    input: impl BufRead,
    mut debouncer: RefreshDebouncer,
) -> Result<ResultSet> {
    let path = resolve(session, file);
    let mut buffer = load_buffer(&path)?;
    let rel = display(session, &path);
    let mut result_set = ResultSet::new();

    for (n, raw) in input.lines().enumerate() {
        let raw = raw.context("Failed to read edit stream")?;
        if raw.trim().is_empty() {
            continue;
        }
        let edit: TypedEdit = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid edit on input line {}", n + 1))?;

        if debouncer.poll(Instant::now()) {
            result_set.extend(decoration_items(session, &rel, &buffer.to_text()));
        }

        let reaction = apply_typed(session, &mut buffer, edit.line, edit.column, &edit.text, edit.reason)
            .with_context(|| format!("Cannot apply edit on input line {}", n + 1))?;
        if let Reaction::Ignored(why) = &reaction {
            debug!("feed: edit {} ignored ({})", n + 1, why.as_str());
        }
        result_set.extend(reaction_items(session, &rel, &buffer, &reaction)?);
        debouncer.touch(Instant::now());
    }

    if debouncer.is_pending() {
        result_set.extend(decoration_items(session, &rel, &buffer.to_text()));
    }
    save_buffer(&path, &buffer)?;
    Ok(result_set)
}

/// Byte offset of a 0-based character column; the end of the line is valid
fn byte_offset(line: &str, column: usize) -> Option<usize> {
    line.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(line.len()))
        .nth(column)
}

pub fn upgrade(session: &Session, dry_run: bool) -> Result<ResultSet> {
    let root = session.require_root("upgrade markers")?;
    let upgrades = upgrade_workspace(root, session.config().cms_folder(), dry_run)?;
    let mut result_set: ResultSet = upgrades
        .into_iter()
        .map(|u| {
            ResultItem::edit(&u.file, u.line, &u.after)
                .with_meta(Meta {
                    id: Some(u.id),
                    ..Meta::default()
                })
                .with_data(json!({ "before": u.before, "applied": !dry_run }))
        })
        .collect();
    result_set.sort();
    Ok(result_set)
}

pub fn run_markers(session: &Session, file: &Path, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&list_markers(session, file)?);
    Ok(())
}

pub fn run_bind(session: &Session, file: &Path, line: usize, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&bind(session, file, line)?);
    Ok(())
}

pub fn run_type(
    session: &Session,
    file: &Path,
    line: usize,
    column: usize,
    text: &str,
    reason: EditReason,
    render_config: RenderConfig,
) -> Result<()> {
    let result_set = type_text(session, file, line, column, text, reason)?;
    Renderer::with_config(render_config).print(&result_set);
    Ok(())
}

pub fn run_feed(session: &Session, file: &Path, render_config: RenderConfig) -> Result<()> {
    let result_set = feed(session, file, std::io::stdin().lock(), RefreshDebouncer::default())?;
    Renderer::with_config(render_config).print(&result_set);
    Ok(())
}

pub fn run_upgrade(session: &Session, dry_run: bool, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&upgrade(session, dry_run)?);
    Ok(())
}
