//! Fragment store - one markdown file per ID under `<cms>/<set>/<id>.md`

use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::core::error::{CodemetaError, Result};
use crate::core::util::{now_iso, shorten, truncate_lines};
use crate::markers::grammar::is_valid_id;
use crate::store::header::{FragmentDocument, Header, RefEntries};

/// Hover preview limits
pub const PREVIEW_MAX_LINES: usize = 12;
pub const PREVIEW_MAX_CHARS: usize = 600;

/// Side-panel title limit
pub const TITLE_MAX_CHARS: usize = 120;

/// Outcome of [`FragmentStore::ensure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured {
    pub path: PathBuf,
    pub created: bool,
}

/// A fragment read back from disk
#[derive(Debug, Clone)]
pub struct FragmentRecord {
    /// ID taken from the file name
    pub id: String,
    pub path: PathBuf,
    /// Category label, defaulted when missing or blank
    pub category: String,
    pub document: FragmentDocument,
}

impl FragmentRecord {
    pub fn created(&self) -> Option<&str> {
        self.document.header.as_ref().and_then(|h| h.get("created"))
    }

    pub fn references(&self) -> RefEntries {
        self.document
            .header
            .as_ref()
            .map(|h| h.references().clone())
            .unwrap_or_default()
    }

    pub fn reference_total(&self) -> u64 {
        self.document
            .header
            .as_ref()
            .map_or(0, |h| h.reference_total())
    }

    pub fn body(&self) -> &str {
        &self.document.body
    }

    /// First body line, with an ellipsis when more follows
    pub fn inline_preview(&self) -> Option<String> {
        let trimmed = self.body().trim();
        let first = trimmed.lines().next()?.trim();
        if first.is_empty() {
            return None;
        }
        let more = trimmed.contains('\n');
        Some(format!("{}{}", first, if more { "…" } else { "" }))
    }

    /// Hover text: the first lines of the body
    pub fn hover_preview(&self) -> Option<String> {
        let trimmed = self.body().trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(truncate_lines(trimmed, PREVIEW_MAX_LINES, PREVIEW_MAX_CHARS))
    }

    /// Short title for listings
    pub fn title(&self) -> String {
        let first = self.body().trim().lines().next().unwrap_or("").trim();
        shorten(first, TITLE_MAX_CHARS)
    }
}

#[derive(Debug, Clone)]
pub struct FragmentStore {
    cms_dir: PathBuf,
    default_category: String,
}

impl FragmentStore {
    pub fn new(cms_dir: impl Into<PathBuf>, default_category: impl Into<String>) -> Self {
        Self {
            cms_dir: cms_dir.into(),
            default_category: default_category.into(),
        }
    }

    pub fn cms_dir(&self) -> &Path {
        &self.cms_dir
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    pub fn set_dir(&self, set: &str) -> PathBuf {
        self.cms_dir.join(set)
    }

    pub fn fragment_path(&self, set: &str, id: &str) -> PathBuf {
        self.set_dir(set).join(format!("{}.md", id))
    }

    /// Create the set directory if needed
    pub fn ensure_set(&self, set: &str) -> Result<PathBuf> {
        let dir = self.set_dir(set);
        fs::create_dir_all(&dir).map_err(|e| CodemetaError::io("create set folder", &dir, e))?;
        Ok(dir)
    }

    /// Return the fragment for `id` in `set`, creating it only if absent.
    ///
    /// Creation uses create-new semantics, so of two racing callers exactly one
    /// writes the initial record and the other observes `created = false`.
    pub fn ensure(&self, set: &str, id: &str) -> Result<Ensured> {
        if !is_valid_id(id) {
            return Err(CodemetaError::InvalidId { id: id.to_string() });
        }
        self.ensure_set(set)?;
        let path = self.fragment_path(set, id);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("fragment {} already exists at {}", id, path.display());
                return Ok(Ensured {
                    path,
                    created: false,
                });
            }
            Err(e) => return Err(CodemetaError::io("create fragment", &path, e)),
        };

        let header = Header::initial(id, &now_iso(), &self.default_category);
        let contents = FragmentDocument::new(header, "").render();
        file.write_all(contents.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| CodemetaError::io("write fragment", &path, e))?;

        info!("created fragment {} in set {}", id, set);
        Ok(Ensured {
            path,
            created: true,
        })
    }

    /// Resolve an ID: legacy flat location first, then every set directory
    pub fn locate(&self, id: &str) -> Option<PathBuf> {
        if !is_valid_id(id) {
            return None;
        }
        let file_name = format!("{}.md", id);

        let flat = self.cms_dir.join(&file_name);
        if flat.is_file() {
            return Some(flat);
        }

        self.set_dirs()
            .into_iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
    }

    /// Set directories under the cms folder, sorted by name
    pub fn set_dirs(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.cms_dir) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        dirs
    }

    pub fn read(&self, path: &Path) -> Result<FragmentRecord> {
        let text =
            fs::read_to_string(path).map_err(|e| CodemetaError::io("read fragment", path, e))?;
        let document = FragmentDocument::parse(&text);
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let category = document
            .header
            .as_ref()
            .map_or(self.default_category.as_str(), |h| {
                h.category_or(&self.default_category)
            })
            .to_string();

        Ok(FragmentRecord {
            id,
            path: path.to_path_buf(),
            category,
            document,
        })
    }

    /// Persist a record, forcing the header `id` to match the file name
    pub fn write(&self, record: &FragmentRecord) -> Result<()> {
        let mut document = record.document.clone();
        let header = document.header.get_or_insert_with(|| {
            Header::initial(&record.id, &now_iso(), &self.default_category)
        });
        if header.get("id") != Some(record.id.as_str()) {
            header.set("id", record.id.as_str());
        }
        fs::write(&record.path, document.render())
            .map_err(|e| CodemetaError::io("write fragment", &record.path, e))
    }

    /// Replace the free-text body, keeping the header
    pub fn write_body(&self, path: &Path, body: &str) -> Result<()> {
        let mut record = self.read(path)?;
        record.document.body = body.to_string();
        self.write(&record)
    }

    /// IDs stored in one set, in numeric order
    pub fn list_ids(&self, set: &str) -> Vec<String> {
        let mut ids = ids_in_dir(&self.set_dir(set));
        ids.sort_by(|a, b| numeric_cmp(a, b));
        ids
    }

    /// Every ID in the flat root and in all sets
    pub fn all_ids(&self) -> Vec<String> {
        let mut ids = ids_in_dir(&self.cms_dir);
        for dir in self.set_dirs() {
            ids.extend(ids_in_dir(&dir));
        }
        ids.sort_by(|a, b| numeric_cmp(a, b));
        ids.dedup();
        ids
    }

    pub fn exists_in_set(&self, set: &str, id: &str) -> bool {
        self.fragment_path(set, id).is_file()
    }
}

fn ids_in_dir(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let stem = name.strip_suffix(".md")?;
            is_valid_id(stem).then(|| stem.to_string())
        })
        .collect()
}

/// Compare decimal strings by value without overflowing
pub fn numeric_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
