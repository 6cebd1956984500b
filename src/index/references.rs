//! Reference index
//!
//! Two ways to answer "where is ID x used":
//! - full scan: read every workspace file and collect bound markers. Always
//!   correct, costs a pass over the workspace.
//! - cache: the `refs` block in the fragment header. Updated one observation
//!   at a time, only ever a hint, superseded by any full scan.

use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::error::Result;
use crate::core::file_reader::read_file_safe;
use crate::core::paths::{join_normalized, make_relative};
use crate::index::walk::workspace_files;
use crate::markers::grammar::scan_line;
use crate::store::fragment::FragmentStore;
use crate::store::header::RefEntries;

/// A bound marker at a 1-based line of a workspace-relative file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Occurrence {
    pub file: String,
    pub line: u32,
}

/// Occurrences per ID, deduplicated by `(file, line)`
pub type OccurrenceMap = BTreeMap<String, BTreeSet<Occurrence>>;

/// Bound IDs in a text, with their 1-based line numbers
pub fn bound_ids_in_text(text: &str) -> Vec<(String, u32)> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let id = scan_line(line)?.id?;
            Some((id, u32::try_from(i + 1).unwrap_or(u32::MAX)))
        })
        .collect()
}

/// Scan one file; unreadable or binary files yield nothing
fn scan_file(root: &Path, path: &Path, wanted: &BTreeSet<String>) -> Vec<(String, Occurrence)> {
    let read = read_file_safe(path);
    let Some(content) = read.content else {
        debug!(
            "skipping {}: {}",
            path.display(),
            read.skip_reason.unwrap_or_default()
        );
        return Vec::new();
    };
    let Some(file) = make_relative(path, root) else {
        return Vec::new();
    };

    bound_ids_in_text(&content)
        .into_iter()
        .filter(|(id, _)| wanted.contains(id))
        .map(|(id, line)| {
            (
                id,
                Occurrence {
                    file: file.clone(),
                    line,
                },
            )
        })
        .collect()
}

fn scan_files(root: &Path, files: &[PathBuf], wanted: &BTreeSet<String>) -> OccurrenceMap {
    #[cfg(feature = "parallel")]
    let found: Vec<Vec<(String, Occurrence)>> = files
        .par_iter()
        .map(|path| scan_file(root, path, wanted))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let found: Vec<Vec<(String, Occurrence)>> = files
        .iter()
        .map(|path| scan_file(root, path, wanted))
        .collect();

    let mut map: OccurrenceMap = wanted
        .iter()
        .map(|id| (id.clone(), BTreeSet::new()))
        .collect();
    for (id, occurrence) in found.into_iter().flatten() {
        map.entry(id).or_default().insert(occurrence);
    }
    map
}

/// Full-scan reconciliation for a set of IDs. Every wanted ID gets an entry,
/// empty when it is not referenced anywhere.
pub fn full_scan(root: &Path, cms_folder: &str, wanted: &BTreeSet<String>) -> OccurrenceMap {
    let files = workspace_files(root, cms_folder);
    info!(
        "scanning {} files for {} ids",
        files.len(),
        wanted.len()
    );
    scan_files(root, &files, wanted)
}

/// Full-scan occurrences of one ID
pub fn find_occurrences(root: &Path, cms_folder: &str, id: &str) -> BTreeSet<Occurrence> {
    let wanted = BTreeSet::from([id.to_string()]);
    full_scan(root, cms_folder, &wanted)
        .remove(id)
        .unwrap_or_default()
}

/// Resolve cached refs to lines by rescanning only the files they name.
/// Paths that no longer exist or no longer mention the ID drop out.
pub fn resolve_cached(root: &Path, refs: &RefEntries, id: &str) -> BTreeSet<Occurrence> {
    let files: Vec<PathBuf> = refs
        .keys()
        .map(|rel| join_normalized(root, rel))
        .filter(|path| path.is_file())
        .collect();
    let wanted = BTreeSet::from([id.to_string()]);
    scan_files(root, &files, &wanted)
        .remove(id)
        .unwrap_or_default()
}

/// Collapse occurrences into per-file counts
pub fn count_by_file(occurrences: &BTreeSet<Occurrence>) -> RefEntries {
    let mut counts = RefEntries::new();
    for occ in occurrences {
        *counts.entry(occ.file.clone()).or_default() += 1;
    }
    counts
}

/// Incremental cache update: merge one `(path, count)` observation into the
/// fragment header and write it back
pub fn update_reference(
    store: &FragmentStore,
    fragment: &Path,
    relative_path: &str,
    count: i64,
) -> Result<RefEntries> {
    let mut record = store.read(fragment)?;
    let header = record.document.header.get_or_insert_with(Default::default);
    header.merge_reference(relative_path, count);
    let refs = header.references().clone();
    store.write(&record)?;
    debug!(
        "refs of {} updated with {}={}",
        record.id, relative_path, count
    );
    Ok(refs)
}

/// Rewrite the fragment's refs block from full-scan results
pub fn sync_references(
    store: &FragmentStore,
    fragment: &Path,
    occurrences: &BTreeSet<Occurrence>,
) -> Result<RefEntries> {
    let mut record = store.read(fragment)?;
    let header = record.document.header.get_or_insert_with(Default::default);
    header.replace_references(count_by_file(occurrences));
    let refs = header.references().clone();
    store.write(&record)?;
    info!("refs of {} synced: {} files", record.id, refs.len());
    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn occ(file: &str, line: u32) -> Occurrence {
        Occurrence {
            file: file.to_string(),
            line,
        }
    }

    #[test]
    fn test_two_files_bind_same_id() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, "a.ts", "one\ntwo\n// codemeta[42] here\n");
        write(
            root,
            "b/b.py",
            "1\n2\n3\n4\n5\n6\n7\n8\n# cm 42 legacy\n",
        );
        write(root, "c.rs", "// codemeta[43]\n");

        let found = find_occurrences(root, ".cms", "42");
        assert_eq!(found.len(), 2);
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec![occ("a.ts", 3), occ("b/b.py", 9)]
        );
    }

    #[test]
    fn test_full_scan_reports_unreferenced_ids() {
        let temp = tempdir().unwrap();
        write(temp.path(), "a.ts", "//codemeta[1]\n//codemeta[1]\n");
        let wanted: BTreeSet<String> = ["1", "2"].iter().map(|s| s.to_string()).collect();

        let map = full_scan(temp.path(), ".cms", &wanted);
        assert_eq!(map["1"].len(), 2);
        assert!(map["2"].is_empty());
    }

    #[test]
    fn test_store_and_binary_files_are_skipped() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, ".cms/default/5.md", "see //codemeta[5]\n");
        fs::write(root.join("blob.bin"), b"//codemeta[5]\0\0").unwrap();
        write(root, "ok.txt", "<!-- codemeta[5] -->\n");

        let found = find_occurrences(root, ".cms", "5");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![occ("ok.txt", 1)]);
    }

    #[test]
    fn test_resolve_cached_rescans_listed_files_only() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, "src/a.ts", "x\n//codemeta[9]\n");
        write(root, "src/b.ts", "//codemeta[9]\n");

        let refs = RefEntries::from([
            ("src/a.ts".to_string(), 4),
            ("src/gone.ts".to_string(), 1),
        ]);
        let found = resolve_cached(root, &refs, "9");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![occ("src/a.ts", 2)]);
    }

    #[test]
    fn test_update_and_sync_reference_block() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let store = FragmentStore::new(root.join(".cms"), "INFO");
        let fragment = store.ensure("default", "42").unwrap().path;

        update_reference(&store, &fragment, "src/b.ts", 1).unwrap();
        let refs = update_reference(&store, &fragment, "src/a.ts", 3).unwrap();
        assert_eq!(refs.len(), 2);
        let text = fs::read_to_string(&fragment).unwrap();
        assert!(text.contains("refs: |\n  3@src/a.ts\n  1@src/b.ts\n---"));

        let refs = update_reference(&store, &fragment, "src/b.ts", 0).unwrap();
        assert_eq!(refs, RefEntries::from([("src/a.ts".to_string(), 3)]));

        let occurrences = BTreeSet::from([occ("lib.rs", 1), occ("lib.rs", 8), occ("main.rs", 2)]);
        let refs = sync_references(&store, &fragment, &occurrences).unwrap();
        assert_eq!(
            refs,
            RefEntries::from([("lib.rs".to_string(), 2), ("main.rs".to_string(), 1)])
        );

        sync_references(&store, &fragment, &BTreeSet::new()).unwrap();
        let text = fs::read_to_string(&fragment).unwrap();
        assert!(!text.contains("refs:"));
    }
}
