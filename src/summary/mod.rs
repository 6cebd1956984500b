//! Summary module - human-readable dumps of a fragment set
//!
//! Collects every fragment of a set together with its full-scan occurrences,
//! then renders the result as Markdown (`SUMMARY.md`) or TOML
//! (`SUMMARY.toml`) inside the set directory.

pub mod api;
pub mod markdown;
pub mod toml_doc;

use log::{info, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{CodemetaError, Result};
use crate::core::paths::display_relative;
use crate::core::util::now_iso;
use crate::index::references::{full_scan, Occurrence};
use crate::store::fragment::FragmentStore;

pub const MARKDOWN_FILE: &str = "SUMMARY.md";
pub const TOML_FILE: &str = "SUMMARY.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    pub id: String,
    pub category: String,
    /// Fragment file, relative to the workspace root
    pub file: String,
    pub content: String,
    pub occurrences: Vec<Occurrence>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub set: String,
    pub generated: String,
    pub entries: Vec<SummaryEntry>,
}

/// Gather the fragments of `set` and resolve their occurrences by full scan
pub fn collect(root: &Path, cms_folder: &str, store: &FragmentStore, set: &str) -> Summary {
    let ids = store.list_ids(set);
    let wanted: BTreeSet<String> = ids.iter().cloned().collect();
    let mut occurrences = full_scan(root, cms_folder, &wanted);

    let entries = ids
        .into_iter()
        .map(|id| {
            let path = store.fragment_path(set, &id);
            let (category, content) = match store.read(&path) {
                Ok(record) => (record.category.clone(), record.body().to_string()),
                Err(e) => {
                    warn!("summary: {}", e);
                    (store.default_category().to_string(), String::new())
                }
            };
            SummaryEntry {
                file: display_relative(&path, root),
                occurrences: occurrences
                    .remove(&id)
                    .map(|found| found.into_iter().collect())
                    .unwrap_or_default(),
                id,
                category,
                content,
            }
        })
        .collect();

    Summary {
        set: set.to_string(),
        generated: now_iso(),
        entries,
    }
}

/// Write a rendered summary into the set directory
pub fn write_summary(store: &FragmentStore, set: &str, file_name: &str, content: &str) -> Result<PathBuf> {
    let dir = store.ensure_set(set)?;
    let path = dir.join(file_name);
    fs::write(&path, content).map_err(|e| CodemetaError::io("write summary", &path, e))?;
    info!("summary written to {}", path.display());
    Ok(path)
}
