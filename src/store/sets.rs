//! Fragment sets - named subdirectories of the cms folder
//!
//! The active set is remembered per workspace in `<cms>/session.json`.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{CodemetaError, Result};
use crate::core::paths::SESSION_FILE;

pub const DEFAULT_SET: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_set: Option<String>,
}

/// Validate a user-supplied set name; runs of whitespace become '-'
pub fn normalize_set_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CodemetaError::InvalidSetName {
            name: name.to_string(),
            reason: "set name cannot be empty",
        });
    }
    if trimmed.contains(['/', '\\']) {
        return Err(CodemetaError::InvalidSetName {
            name: name.to_string(),
            reason: "slashes are not allowed",
        });
    }
    if trimmed == "." || trimmed == ".." {
        return Err(CodemetaError::InvalidSetName {
            name: name.to_string(),
            reason: "relative directory names are not allowed",
        });
    }
    Ok(trimmed.split_whitespace().collect::<Vec<_>>().join("-"))
}

/// Read the persisted active set, `default` when missing or invalid
pub fn load_active_set(cms_dir: &Path) -> String {
    let path = cms_dir.join(SESSION_FILE);
    let Ok(text) = fs::read_to_string(&path) else {
        return DEFAULT_SET.to_string();
    };
    let session: SessionFile = match serde_json::from_str(&text) {
        Ok(s) => s,
        Err(e) => {
            warn!("ignoring unreadable {}: {}", path.display(), e);
            return DEFAULT_SET.to_string();
        }
    };
    session
        .active_set
        .and_then(|name| normalize_set_name(&name).ok())
        .unwrap_or_else(|| DEFAULT_SET.to_string())
}

pub fn save_active_set(cms_dir: &Path, set: &str) -> Result<()> {
    fs::create_dir_all(cms_dir).map_err(|e| CodemetaError::io("create cms folder", cms_dir, e))?;
    let path = cms_dir.join(SESSION_FILE);
    let session = SessionFile {
        active_set: Some(set.to_string()),
    };
    let json = serde_json::to_string(&session)
        .map_err(|source| CodemetaError::State {
            path: path.clone(),
            source,
        })?;
    fs::write(&path, json).map_err(|e| CodemetaError::io("save active set", &path, e))?;
    debug!("active set is now {}", set);
    Ok(())
}

/// Available sets: the active one first, then `default`, then every directory
pub fn list_sets(cms_dir: &Path, active: &str) -> Vec<String> {
    let mut dirs: Vec<String> = fs::read_dir(cms_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    dirs.sort();

    let mut sets = vec![active.to_string()];
    for name in std::iter::once(DEFAULT_SET.to_string()).chain(dirs) {
        if !sets.contains(&name) {
            sets.push(name);
        }
    }
    sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_set_name() {
        assert_eq!(normalize_set_name("  sprint 12  ").unwrap(), "sprint-12");
        assert_eq!(normalize_set_name("a \t b").unwrap(), "a-b");
        assert!(normalize_set_name("   ").is_err());
        assert!(normalize_set_name("a/b").is_err());
        assert!(normalize_set_name("a\\b").is_err());
        assert!(normalize_set_name("..").is_err());
    }

    #[test]
    fn test_active_set_round_trip() {
        let temp = tempdir().unwrap();
        let cms = temp.path().join(".cms");
        assert_eq!(load_active_set(&cms), "default");

        save_active_set(&cms, "notes").unwrap();
        assert_eq!(load_active_set(&cms), "notes");
    }

    #[test]
    fn test_corrupt_session_falls_back() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(SESSION_FILE), "{not json").unwrap();
        assert_eq!(load_active_set(temp.path()), "default");

        fs::write(temp.path().join(SESSION_FILE), r#"{"activeSet":"a/b"}"#).unwrap();
        assert_eq!(load_active_set(temp.path()), "default");
    }

    #[test]
    fn test_list_sets_orders_active_first() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("zeta")).unwrap();
        fs::create_dir_all(temp.path().join("alpha")).unwrap();
        fs::write(temp.path().join("state.json"), "{}").unwrap();

        assert_eq!(
            list_sets(temp.path(), "zeta"),
            vec!["zeta", "default", "alpha"]
        );
        assert_eq!(list_sets(&temp.path().join("none"), "default"), vec!["default"]);
    }
}
