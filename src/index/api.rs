//! Reference API - occurrence queries and refs-block maintenance

use anyhow::{bail, Result};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::core::error::CodemetaError;
use crate::core::model::{Confidence, ResultItem, ResultSet, SourceMode};
use crate::core::paths::display_relative;
use crate::core::render::{RenderConfig, Renderer};
use crate::core::session::Session;
use crate::index::references::{
    find_occurrences, resolve_cached, sync_references, update_reference, Occurrence,
};
use crate::store::header::RefEntries;

fn locate(session: &Session, id: &str) -> Result<PathBuf> {
    let store = session.store("locate fragment")?;
    Ok(store
        .locate(id)
        .ok_or_else(|| CodemetaError::FragmentNotFound { id: id.to_string() })?)
}

fn occurrence_items(id: &str, occurrences: BTreeSet<Occurrence>, cached: bool) -> Vec<ResultItem> {
    occurrences
        .into_iter()
        .map(|occ| {
            let item = ResultItem::occurrence(occ.file, occ.line, id);
            if cached {
                item.with_confidence(Confidence::Low)
                    .with_source_mode(SourceMode::Cache)
            } else {
                item
            }
        })
        .collect()
}

fn refs_item(session: &Session, id: &str, fragment: &Path, refs: &RefEntries) -> Result<ResultItem> {
    let root = session.require_root("read references")?;
    Ok(ResultItem::fragment(display_relative(fragment, root), id).with_data(json!({
        "refs": refs,
        "refCount": refs.values().map(|&c| u64::from(c)).sum::<u64>(),
    })))
}

/// Occurrences of an ID: full scan by default, cached refs block on request
pub fn references(session: &Session, id: &str, cached: bool) -> Result<ResultSet> {
    let root = session.require_root("find references")?;
    let occurrences = if cached {
        let fragment = locate(session, id)?;
        let record = session.store("read fragment")?.read(&fragment)?;
        resolve_cached(root, &record.references(), id)
    } else {
        find_occurrences(root, session.config().cms_folder(), id)
    };
    Ok(occurrence_items(id, occurrences, cached).into_iter().collect())
}

/// Replace the refs block with full-scan counts
pub fn sync(session: &Session, id: &str) -> Result<ResultSet> {
    let root = session.require_root("sync references")?;
    let fragment = locate(session, id)?;
    let occurrences = find_occurrences(root, session.config().cms_folder(), id);
    let refs = sync_references(session.store("sync references")?, &fragment, &occurrences)?;

    let mut result_set = ResultSet::new();
    result_set.push(refs_item(session, id, &fragment, &refs)?);
    result_set.extend(occurrence_items(id, occurrences, false));
    Ok(result_set)
}

/// Merge one `(path, count)` observation into the refs block
pub fn update(session: &Session, id: &str, path: &str, count: i64) -> Result<ResultSet> {
    let relative = path.trim().replace('\\', "/");
    if relative.is_empty() {
        bail!("Reference path must not be empty");
    }
    if relative.contains(['\r', '\n']) {
        bail!("Reference path must be a single line: {:?}", path);
    }
    let fragment = locate(session, id)?;
    let refs = update_reference(session.store("update references")?, &fragment, &relative, count)?;
    Ok(ResultSet::from_iter([refs_item(session, id, &fragment, &refs)?]))
}

pub fn run_refs(session: &Session, id: &str, cached: bool, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&references(session, id, cached)?);
    Ok(())
}

pub fn run_sync(session: &Session, id: &str, render_config: RenderConfig) -> Result<()> {
    Renderer::with_config(render_config).print(&sync(session, id)?);
    Ok(())
}

pub fn run_update(
    session: &Session,
    id: &str,
    path: &str,
    count: i64,
    render_config: RenderConfig,
) -> Result<()> {
    Renderer::with_config(render_config).print(&update(session, id, path, count)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use std::fs;
    use tempfile::tempdir;

    fn open(root: &Path) -> Session {
        Session::open(Some(root.to_path_buf()), Config::default(), None).unwrap()
    }

    #[test]
    fn test_cached_refs_are_low_confidence_hints() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("a.rs"), "//codemeta[8]\n").unwrap();
        fs::write(root.join("b.rs"), "\n//codemeta[8]\n").unwrap();
        let session = open(root);
        session.store("x").unwrap().ensure("default", "8").unwrap();

        update(&session, "8", "a.rs", 1).unwrap();
        let cached = references(&session, "8", true).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached.items[0].confidence, Confidence::Low);
        assert_eq!(cached.items[0].source_mode, SourceMode::Cache);

        let scanned = references(&session, "8", false).unwrap();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned.items[1].path.as_deref(), Some("b.rs"));
        assert_eq!(scanned.items[1].confidence, Confidence::High);
    }

    #[test]
    fn test_sync_overrides_cache() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("a.rs"), "//codemeta[8]\n//codemeta[8]\n").unwrap();
        let session = open(root);
        session.store("x").unwrap().ensure("default", "8").unwrap();
        update(&session, "8", "stale.rs", 4).unwrap();

        let result = sync(&session, "8").unwrap();
        assert_eq!(result.items[0].data.as_ref().unwrap()["refs"], json!({ "a.rs": 2 }));
        assert_eq!(result.len(), 3);

        let text = fs::read_to_string(root.join(".cms/default/8.md")).unwrap();
        assert!(text.contains("refs: |\n  2@a.rs\n---"));
    }

    #[test]
    fn test_update_rejects_paths_that_break_the_header() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let session = open(root);
        session.store("x").unwrap().ensure("default", "8").unwrap();

        assert!(update(&session, "8", "x\ncategory: EVIL", 2).is_err());
        assert!(update(&session, "8", "a\rb.rs", 2).is_err());
        assert!(update(&session, "8", "   ", 2).is_err());

        let result = update(&session, "8", "  src\\padded.ts ", 2).unwrap();
        assert_eq!(result.items[0].data.as_ref().unwrap()["refs"], json!({ "src/padded.ts": 2 }));

        let text = fs::read_to_string(root.join(".cms/default/8.md")).unwrap();
        assert!(text.contains("category: INFO\nrefs: |\n  2@src/padded.ts\n---"));
        assert!(!text.contains("EVIL"));

        let cached = references(&session, "8", true).unwrap();
        assert!(cached.is_empty());
    }

    #[test]
    fn test_missing_fragment() {
        let temp = tempdir().unwrap();
        let session = open(temp.path());
        assert!(update(&session, "1", "a.rs", 1).is_err());
        assert!(references(&session, "1", true).is_err());
        assert!(references(&session, "1", false).unwrap().is_empty());
    }
}
