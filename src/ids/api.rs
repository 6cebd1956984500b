//! ID API

use anyhow::Result;
use serde_json::json;

use crate::core::model::{ResultItem, ResultSet, SourceMode};
use crate::core::render::{RenderConfig, Renderer};
use crate::core::session::Session;
use crate::ids::allocator::generate_random;

/// Mint the next sequential ID
pub fn next_id(session: &Session) -> Result<ResultSet> {
    let store = session.store("allocate id")?;
    let id = session.allocator().allocate(store)?;
    Ok(ResultSet::from_iter([ResultItem::id(id)]))
}

/// Legacy fixed-length random ID, free in every set
pub fn random_id(session: &Session, length: Option<usize>) -> Result<ResultSet> {
    let length = length.unwrap_or_else(|| session.config().id_length());
    let store = session.store("generate random id").ok();
    let set = session.active_set();
    let id = generate_random(length, |candidate| {
        store.is_some_and(|s| s.exists_in_set(set, candidate) || s.locate(candidate).is_some())
    })?;
    let item = ResultItem::id(&id)
        .with_source_mode(SourceMode::Scan)
        .with_data(json!({ "legacy": true, "length": id.len() }));
    Ok(ResultSet::from_iter([item]))
}

pub fn run_next(session: &Session, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&next_id(session)?);
    Ok(())
}

pub fn run_random(session: &Session, length: Option<usize>, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&random_id(session, length)?);
    Ok(())
}
