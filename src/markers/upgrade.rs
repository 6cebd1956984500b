//! Legacy marker upgrade
//!
//! Batch text substitution from `//cm 123` / `#cm 123` / `//cm[123]` to the
//! canonical `//codemeta[123]`. Only bound markers are touched: an unbound
//! `cm` may well be ordinary prose.

use log::{info, warn};
use std::fs;
use std::path::Path;

use crate::core::error::{CodemetaError, Result};
use crate::core::file_reader::read_file_safe;
use crate::core::paths::make_relative;
use crate::index::walk::workspace_files;
use crate::markers::grammar::scan_line;
use crate::markers::rewrite::{canonical_form, LineBuffer, TextBuffer, TextEdit};

/// One rewritten line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineUpgrade {
    pub file: String,
    /// 1-based
    pub line: u32,
    pub id: String,
    pub before: String,
    pub after: String,
}

/// Canonical form of a line, or `None` when it holds no bound legacy marker
pub fn upgrade_line(line: &str) -> Option<String> {
    let marker = scan_line(line)?;
    let id = marker.id.as_deref()?;
    if !marker.is_legacy() {
        return None;
    }
    let mut upgraded = String::with_capacity(line.len() + 8);
    upgraded.push_str(&line[..marker.start]);
    upgraded.push_str(&canonical_form(&marker, line, id));
    upgraded.push_str(&line[marker.id_end..]);
    Some(upgraded)
}

/// Upgrade every line of a text, returning the edits made
pub fn upgrade_buffer(buffer: &mut LineBuffer) -> Result<Vec<TextEdit>> {
    let mut edits = Vec::new();
    for index in 0..buffer.len() {
        let Some(line) = buffer.line(index) else {
            continue;
        };
        if let Some(after) = upgrade_line(line) {
            let edit = TextEdit {
                line: index,
                start: 0,
                end: line.len(),
                replacement: after,
            };
            buffer.apply(&edit)?;
            edits.push(edit);
        }
    }
    Ok(edits)
}

/// Upgrade legacy markers in every workspace file. With `dry_run` nothing is
/// written.
pub fn upgrade_workspace(root: &Path, cms_folder: &str, dry_run: bool) -> Result<Vec<LineUpgrade>> {
    let mut upgrades = Vec::new();

    for path in workspace_files(root, cms_folder) {
        let read = read_file_safe(&path);
        if read.lossy_conversion {
            warn!("not upgrading {}: not valid UTF-8", path.display());
            continue;
        }
        let Some(text) = read.content else {
            continue;
        };
        let mut buffer = LineBuffer::from_text(&text);
        let before = buffer.clone();
        let edits = upgrade_buffer(&mut buffer)?;
        if edits.is_empty() {
            continue;
        }

        let file = make_relative(&path, root).unwrap_or_else(|| path.display().to_string());
        for edit in &edits {
            let Some(id) = scan_line(&edit.replacement).and_then(|m| m.id) else {
                warn!("upgraded line {} of {} lost its id", edit.line + 1, file);
                continue;
            };
            upgrades.push(LineUpgrade {
                file: file.clone(),
                line: u32::try_from(edit.line + 1).unwrap_or(u32::MAX),
                id,
                before: before.line(edit.line).unwrap_or_default().to_string(),
                after: edit.replacement.clone(),
            });
        }

        if dry_run {
            info!("would upgrade {} markers in {}", edits.len(), file);
        } else {
            fs::write(&path, buffer.to_text())
                .map_err(|e| CodemetaError::io("upgrade markers", &path, e))?;
            info!("upgraded {} markers in {}", edits.len(), file);
        }
    }

    Ok(upgrades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_upgrade_keeps_trailing_comment() {
        assert_eq!(
            upgrade_line("//cm 5664210353 [Remove this]").as_deref(),
            Some("//codemeta[5664210353] [Remove this]")
        );
    }

    #[test]
    fn test_upgrade_forms() {
        assert_eq!(
            upgrade_line("    x = 1  # cm 12345678").as_deref(),
            Some("    x = 1  # codemeta[12345678]")
        );
        assert_eq!(upgrade_line("//cm[9]").as_deref(), Some("//codemeta[9]"));
        assert_eq!(
            upgrade_line("<!-- codemeta 77 -->").as_deref(),
            Some("<!-- codemeta[77] -->")
        );
    }

    #[test]
    fn test_canonical_and_unbound_lines_untouched() {
        assert_eq!(upgrade_line("//codemeta[5] done"), None);
        assert_eq!(upgrade_line("// cm is a unit"), None);
        assert_eq!(upgrade_line("//cm"), None);
        assert_eq!(upgrade_line("plain text"), None);
    }

    #[test]
    fn test_upgrade_is_idempotent() {
        let once = upgrade_line("#cm 123456 note").unwrap();
        assert_eq!(upgrade_line(&once), None);
    }

    #[test]
    fn test_workspace_upgrade_and_dry_run() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("a.rs"), "fn a() {}\n//cm 5664210353 [Remove this]\n").unwrap();
        fs::write(root.join("b.py"), "# codemeta[1]\n").unwrap();
        fs::create_dir_all(root.join(".cms/default")).unwrap();
        fs::write(root.join(".cms/default/1.md"), "//cm 1\n").unwrap();

        let planned = upgrade_workspace(root, ".cms", true).unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].file, "a.rs");
        assert_eq!(planned[0].line, 2);
        assert_eq!(planned[0].id, "5664210353");
        assert!(fs::read_to_string(root.join("a.rs")).unwrap().contains("//cm 5664210353"));

        let done = upgrade_workspace(root, ".cms", false).unwrap();
        assert_eq!(done, planned);
        assert_eq!(
            fs::read_to_string(root.join("a.rs")).unwrap(),
            "fn a() {}\n//codemeta[5664210353] [Remove this]\n"
        );
        assert_eq!(fs::read_to_string(root.join(".cms/default/1.md")).unwrap(), "//cm 1\n");
        assert!(upgrade_workspace(root, ".cms", false).unwrap().is_empty());
    }

    #[test]
    fn test_workspace_upgrade_keeps_mixed_line_endings() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("mixed.js"), "a\nb\r\n//cm 123456 x\nc\n").unwrap();

        let done = upgrade_workspace(root, ".cms", false).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].line, 3);
        assert_eq!(
            fs::read_to_string(root.join("mixed.js")).unwrap(),
            "a\nb\r\n//codemeta[123456] x\nc\n"
        );
    }
}
