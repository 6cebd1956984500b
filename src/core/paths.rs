//! Path normalization utilities
//!
//! Paths reported to callers use '/' as separator and are relative to the
//! workspace root.

use std::path::{Path, PathBuf};

/// Name of the allocator state file inside the cms folder
pub const STATE_FILE: &str = "state.json";

/// Name of the session file (active set) inside the cms folder
pub const SESSION_FILE: &str = "session.json";

/// Normalize a path to use '/' as separator (for cross-platform consistency)
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Make a path relative to the root directory
pub fn make_relative(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(normalize_path)
}

/// Join a '/'-separated relative path onto a base directory
pub fn join_normalized(base: &Path, relative: &str) -> PathBuf {
    base.join(relative.replace(['/', '\\'], std::path::MAIN_SEPARATOR_STR))
}

/// Relative path for display, falling back to the full path outside the root
pub fn display_relative(path: &Path, root: &Path) -> String {
    make_relative(path, root).unwrap_or_else(|| normalize_path(path))
}

/// Get the cms folder for a given root
pub fn cms_dir(root: &Path, folder: &str) -> PathBuf {
    root.join(folder)
}
