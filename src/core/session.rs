//! Per-workspace session state
//!
//! Holds what used to be process-wide: the active set and the flag that hides
//! the engine's own edits from the edit-observation path. Two sessions never
//! share either.

use log::debug;
use std::cell::Cell;
use std::path::{Path, PathBuf};

use crate::core::config::Config;
use crate::core::error::{CodemetaError, Result};
use crate::core::paths::cms_dir;
use crate::ids::allocator::IdAllocator;
use crate::store::fragment::FragmentStore;
use crate::store::sets::{self, DEFAULT_SET};

#[derive(Debug)]
pub struct Session {
    root: Option<PathBuf>,
    config: Config,
    store: Option<FragmentStore>,
    active_set: String,
    suppress_self_edits: Cell<bool>,
}

impl Session {
    /// Open a session. `set_override` replaces the remembered active set for
    /// this session only.
    pub fn open(root: Option<PathBuf>, config: Config, set_override: Option<&str>) -> Result<Self> {
        let cms = root.as_deref().map(|r| cms_dir(r, config.cms_folder()));
        let active_set = match (set_override, cms.as_deref()) {
            (Some(name), _) => sets::normalize_set_name(name)?,
            (None, Some(cms)) => sets::load_active_set(cms),
            (None, None) => DEFAULT_SET.to_string(),
        };
        let store = cms.map(|dir| FragmentStore::new(dir, config.default_category()));
        debug!("session opened, active set {}", active_set);

        Ok(Self {
            root,
            config,
            store,
            active_set,
            suppress_self_edits: Cell::new(false),
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Workspace root, or `NoWorkspaceRoot` naming the operation that needed it
    pub fn require_root(&self, operation: &'static str) -> Result<&Path> {
        self.root()
            .ok_or(CodemetaError::NoWorkspaceRoot { operation })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self, operation: &'static str) -> Result<&FragmentStore> {
        self.store
            .as_ref()
            .ok_or(CodemetaError::NoWorkspaceRoot { operation })
    }

    pub fn allocator(&self) -> IdAllocator {
        IdAllocator::new(self.store.as_ref().map(|s| s.cms_dir().to_path_buf()))
    }

    pub fn active_set(&self) -> &str {
        &self.active_set
    }

    /// Make `name` the active set, creating its folder and remembering it
    pub fn switch_set(&mut self, name: &str) -> Result<String> {
        let name = sets::normalize_set_name(name)?;
        let store = self.store("switch set")?;
        store.ensure_set(&name)?;
        sets::save_active_set(store.cms_dir(), &name)?;
        self.active_set = name.clone();
        Ok(name)
    }

    /// Sets in display order, active first
    pub fn list_sets(&self) -> Vec<String> {
        match &self.store {
            Some(store) => sets::list_sets(store.cms_dir(), &self.active_set),
            None => vec![self.active_set.clone()],
        }
    }

    pub fn is_suppressing_self_edits(&self) -> bool {
        self.suppress_self_edits.get()
    }

    /// Hide edits from the observation path until the guard drops
    pub fn suppress_self_edits(&self) -> SuppressGuard<'_> {
        let previous = self.suppress_self_edits.replace(true);
        SuppressGuard {
            flag: &self.suppress_self_edits,
            previous,
        }
    }
}

/// Restores the previous suppression state on drop
pub struct SuppressGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_guard_is_scoped() {
        let session = Session::open(None, Config::default(), None).unwrap();
        assert!(!session.is_suppressing_self_edits());
        {
            let _outer = session.suppress_self_edits();
            assert!(session.is_suppressing_self_edits());
            {
                let _inner = session.suppress_self_edits();
            }
            assert!(session.is_suppressing_self_edits());
        }
        assert!(!session.is_suppressing_self_edits());
    }

    #[test]
    fn test_no_root_session() {
        let session = Session::open(None, Config::default(), None).unwrap();
        assert_eq!(session.active_set(), "default");
        assert!(matches!(
            session.store("create fragment"),
            Err(CodemetaError::NoWorkspaceRoot { operation: "create fragment" })
        ));
    }

    #[test]
    fn test_switch_set_persists() {
        let temp = tempdir().unwrap();
        let root = temp.path().to_path_buf();

        let mut session = Session::open(Some(root.clone()), Config::default(), None).unwrap();
        assert_eq!(session.switch_set(" sprint 12 ").unwrap(), "sprint-12");
        assert!(root.join(".cms/sprint-12").is_dir());

        let reopened = Session::open(Some(root.clone()), Config::default(), None).unwrap();
        assert_eq!(reopened.active_set(), "sprint-12");

        let overridden = Session::open(Some(root), Config::default(), Some("other")).unwrap();
        assert_eq!(overridden.active_set(), "other");
    }

    #[test]
    fn test_sessions_do_not_share_state() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let mut first = Session::open(Some(a.path().into()), Config::default(), None).unwrap();
        let second = Session::open(Some(b.path().into()), Config::default(), None).unwrap();

        first.switch_set("notes").unwrap();
        let _guard = first.suppress_self_edits();
        assert_eq!(second.active_set(), "default");
        assert!(!second.is_suppressing_self_edits());
    }

    #[test]
    fn test_cms_folder_from_config() {
        let temp = tempdir().unwrap();
        let config = Config::default().with_cms_folder("cms");
        let session = Session::open(Some(temp.path().into()), config, None).unwrap();
        assert_eq!(session.store("x").unwrap().cms_dir(), temp.path().join("cms"));
    }
}
