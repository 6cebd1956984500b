//! Store API - fragment and set commands

use anyhow::{bail, Context, Result};
use log::debug;
use serde_json::json;
use std::io::Read;
use std::path::Path;

use crate::core::error::CodemetaError;
use crate::core::model::{ItemError, ResultItem, ResultSet};
use crate::core::paths::display_relative;
use crate::core::render::{RenderConfig, Renderer};
use crate::core::session::Session;
use crate::store::fragment::{Ensured, FragmentRecord, FragmentStore};

/// Where the fragment text comes from for `fragment write`
#[derive(Debug, Clone)]
pub enum BodySource {
    Text(String),
    Stdin,
}

fn display(session: &Session, path: &Path) -> String {
    match session.root() {
        Some(root) => display_relative(path, root),
        None => path.display().to_string(),
    }
}

/// Result item for an ensured or located fragment
pub fn fragment_item(session: &Session, store: &FragmentStore, id: &str, ensured: &Ensured) -> ResultItem {
    let mut item = ResultItem::fragment(display(session, &ensured.path), id);
    let mut data = json!({ "created": ensured.created });
    if let Ok(record) = store.read(&ensured.path) {
        data["contentStartLine"] = json!(record.document.content_start_line() + 1);
        item = item.with_category(record.category);
    }
    item.with_data(data)
}

fn record_item(session: &Session, record: &FragmentRecord) -> ResultItem {
    let mut item = ResultItem::fragment(display(session, &record.path), &record.id)
        .with_category(&record.category);
    if !record.body().trim().is_empty() {
        item = item.with_excerpt(record.body().trim_end());
    }
    item.with_data(json!({
        "created": record.created(),
        "title": record.title(),
        "refs": record.references(),
        "refCount": record.reference_total(),
        "contentStartLine": record.document.content_start_line() + 1,
    }))
}

pub fn ensure_fragment(session: &Session, id: &str) -> Result<ResultSet> {
    let store = session.store("create fragment")?;
    let ensured = match store.locate(id) {
        Some(path) => Ensured {
            path,
            created: false,
        },
        None => store.ensure(session.active_set(), id)?,
    };
    Ok(ResultSet::from_iter([fragment_item(session, store, id, &ensured)]))
}

pub fn locate_fragment(session: &Session, id: &str) -> Result<ResultSet> {
    let store = session.store("locate fragment")?;
    let path = store
        .locate(id)
        .ok_or_else(|| CodemetaError::FragmentNotFound { id: id.to_string() })?;
    let ensured = Ensured {
        path,
        created: false,
    };
    Ok(ResultSet::from_iter([fragment_item(session, store, id, &ensured)]))
}

pub fn show_fragment(session: &Session, id: &str) -> Result<ResultSet> {
    let store = session.store("read fragment")?;
    let path = store
        .locate(id)
        .ok_or_else(|| CodemetaError::FragmentNotFound { id: id.to_string() })?;
    let record = store.read(&path)?;
    Ok(ResultSet::from_iter([record_item(session, &record)]))
}

pub fn write_fragment(session: &Session, id: &str, source: BodySource) -> Result<ResultSet> {
    let body = match source {
        BodySource::Text(text) => text,
        BodySource::Stdin => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read fragment body from stdin")?;
            text
        }
    };

    let store = session.store("write fragment")?;
    let path = match store.locate(id) {
        Some(path) => path,
        None => store.ensure(session.active_set(), id)?.path,
    };
    store.write_body(&path, &body)?;
    debug!("wrote {} bytes to fragment {}", body.len(), id);

    let record = store.read(&path)?;
    Ok(ResultSet::from_iter([record_item(session, &record)]))
}

/// Fragments of the active set in numeric order
pub fn list_fragments(session: &Session) -> Result<ResultSet> {
    let store = session.store("list fragments")?;
    let set = session.active_set();
    let mut result_set = ResultSet::new();
    for id in store.list_ids(set) {
        let path = store.fragment_path(set, &id);
        match store.read(&path) {
            Ok(record) => result_set.push(record_item(session, &record)),
            Err(e) => {
                debug!("list: unreadable fragment {}: {}", id, e);
                let mut item = ResultItem::error(ItemError::new("fragment_unreadable", e.to_string()));
                item.path = Some(display(session, &path));
                item.meta.id = Some(id);
                result_set.push(item);
            }
        }
    }
    Ok(result_set)
}

fn set_item(session: &Session, name: &str) -> ResultItem {
    let path = match session.store("list sets") {
        Ok(store) => display(session, &store.set_dir(name)),
        Err(_) => name.to_string(),
    };
    ResultItem::set(path).with_data(json!({
        "name": name,
        "active": name == session.active_set(),
    }))
}

pub fn list_sets(session: &Session) -> ResultSet {
    session
        .list_sets()
        .iter()
        .map(|name| set_item(session, name))
        .collect()
}

pub fn current_set(session: &Session) -> ResultSet {
    ResultSet::from_iter([set_item(session, session.active_set())])
}

/// Create a set (if needed) and make it active
pub fn switch_set(session: &mut Session, name: &str, must_exist: bool) -> Result<ResultSet> {
    if must_exist {
        let store = session.store("switch set")?;
        let normalized = crate::store::sets::normalize_set_name(name)?;
        if !store.set_dir(&normalized).is_dir() && !session.list_sets().contains(&normalized) {
            bail!("Set '{}' does not exist; create it with `set new`", normalized);
        }
    }
    session.switch_set(name)?;
    Ok(current_set(session))
}

pub fn run_ensure(session: &Session, id: &str, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&ensure_fragment(session, id)?);
    Ok(())
}

pub fn run_locate(session: &Session, id: &str, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&locate_fragment(session, id)?);
    Ok(())
}

pub fn run_show(session: &Session, id: &str, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&show_fragment(session, id)?);
    Ok(())
}

pub fn run_write(
    session: &Session,
    id: &str,
    source: BodySource,
    render_config: RenderConfig,
) -> Result<()> {
    Renderer::with_config(render_config).print(&write_fragment(session, id, source)?);
    Ok(())
}

pub fn run_list(session: &Session, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&list_fragments(session)?);
    Ok(())
}

pub fn run_set_list(session: &Session, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&list_sets(session));
    Ok(())
}

pub fn run_set_current(session: &Session, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&current_set(session));
    Ok(())
}

pub fn run_set_switch(
    session: &mut Session,
    name: &str,
    must_exist: bool,
    render_config: RenderConfig,
) -> Result<()> {
    let result_set = switch_set(session, name, must_exist)?;
    Renderer::with_config(render_config).print(&result_set);
    Ok(())
}
