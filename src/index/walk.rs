//! Workspace enumeration for full scans
//!
//! Uses the ignore crate, so `.gitignore` rules apply inside git
//! repositories. Dependency, build and VCS folders and the cms folder are
//! always skipped, at any depth.

use ignore::WalkBuilder;
use log::debug;
use std::path::{Path, PathBuf};

/// Directory names never scanned
pub const EXCLUDED_DIRS: [&str; 5] = ["node_modules", ".git", "dist", "out", "target"];

/// Every eligible file under `root`, sorted
pub fn workspace_files(root: &Path, cms_folder: &str) -> Vec<PathBuf> {
    let cms_name = cms_folder.trim_matches('/').to_string();
    let cms_path = root.join(&cms_name);

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .filter_entry(move |entry| {
            if entry.depth() == 0 || !entry.file_type().is_some_and(|t| t.is_dir()) {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            let name: &str = &name;
            !(EXCLUDED_DIRS.contains(&name)
                || name == cms_name
                || entry.path() == cms_path)
        });

    let mut files: Vec<PathBuf> = builder
        .build()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                debug!("skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::make_relative;
    use std::fs;
    use tempfile::tempdir;

    fn relative(root: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .iter()
            .filter_map(|f| make_relative(f, root))
            .collect()
    }

    #[test]
    fn test_excludes_build_and_store_folders() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        for file in [
            "src/a.rs",
            ".hidden/b.sh",
            "node_modules/x/index.js",
            "pkg/node_modules/y.js",
            "dist/out.js",
            "out/main.js",
            "target/debug/z.rs",
            ".cms/default/1.md",
            ".cms/state.json",
        ] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }

        let files = relative(root, workspace_files(root, ".cms"));
        assert_eq!(files, vec![".hidden/b.sh", "src/a.rs"]);
    }

    #[test]
    fn test_custom_cms_folder() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("cms/default")).unwrap();
        fs::write(root.join("cms/default/1.md"), "//codemeta[1]").unwrap();
        fs::write(root.join("main.py"), "# codemeta[1]").unwrap();

        let files = relative(root, workspace_files(root, "cms"));
        assert_eq!(files, vec!["main.py"]);
    }
}
