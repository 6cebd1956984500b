//! ID allocation
//!
//! New markers get sequential IDs from a counter persisted in
//! `<cms>/state.json` as `{ "nextId": <integer> }`. The counter is written
//! durably before the ID is handed out, so a crash can leave a gap but never
//! hands the same ID out twice.
//!
//! Fixed-length random IDs are the legacy scheme. They are still readable
//! everywhere; generation is kept for tooling only.

use log::{debug, warn};
use rand::Rng;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::core::config::clamp_id_length;
use crate::core::error::{CodemetaError, Result};
use crate::core::paths::STATE_FILE;
use crate::store::fragment::FragmentStore;

/// Re-roll limit for random IDs before giving up
pub const MAX_RANDOM_ATTEMPTS: usize = 64;

#[derive(Debug, Serialize)]
struct AllocatorState {
    #[serde(rename = "nextId")]
    next_id: u64,
}

#[derive(Debug, Clone)]
pub struct IdAllocator {
    /// `None` when there is no workspace to persist into
    cms_dir: Option<PathBuf>,
}

impl IdAllocator {
    pub fn new(cms_dir: Option<PathBuf>) -> Self {
        Self { cms_dir }
    }

    fn state_path(&self, operation: &'static str) -> Result<PathBuf> {
        self.cms_dir
            .as_ref()
            .map(|dir| dir.join(STATE_FILE))
            .ok_or(CodemetaError::NoWorkspaceRoot { operation })
    }

    /// Peek at the persisted counter without advancing it
    pub fn next_id(&self, store: &FragmentStore) -> Result<u64> {
        let path = self.state_path("read allocator state")?;
        Ok(read_counter(&path, store))
    }

    /// Mint the next sequential ID and persist the advanced counter.
    ///
    /// IDs already backed by a fragment file are skipped, so a lost or reset
    /// state file cannot cause reuse.
    pub fn allocate(&self, store: &FragmentStore) -> Result<String> {
        let path = self.state_path("allocate id")?;
        let mut candidate = read_counter(&path, store);

        while store.locate(&candidate.to_string()).is_some() {
            warn!("id {} is already in use, skipping", candidate);
            candidate = advance(candidate)?;
        }

        write_counter(&path, advance(candidate)?)?;
        debug!("allocated id {}", candidate);
        Ok(candidate.to_string())
    }
}

fn advance(id: u64) -> Result<u64> {
    id.checked_add(1)
        .ok_or(CodemetaError::IdSpaceExhausted { last: id })
}

fn read_counter(path: &Path, store: &FragmentStore) -> u64 {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return 0,
        Err(e) => {
            let recovered = recover_counter(store);
            warn!(
                "cannot read allocator state at {}: {}, resuming from {}",
                path.display(),
                e,
                recovered
            );
            return recovered;
        }
    };

    let parsed: Option<u64> = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("nextId").and_then(|n| n.as_u64()));

    match parsed {
        Some(n) => n,
        None => {
            let recovered = recover_counter(store);
            warn!(
                "malformed allocator state at {}, resuming from {}",
                path.display(),
                recovered
            );
            recovered
        }
    }
}

/// One past the highest numeric fragment ID on disk
fn recover_counter(store: &FragmentStore) -> u64 {
    store
        .all_ids()
        .iter()
        .filter_map(|id| id.parse::<u64>().ok())
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

fn write_counter(path: &Path, next_id: u64) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| CodemetaError::io("create cms folder", dir, e))?;
    }

    let json = serde_json::to_string(&AllocatorState { next_id }).map_err(|source| {
        CodemetaError::State {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let tmp = path.with_extension("json.tmp");
    let mut file =
        File::create(&tmp).map_err(|e| CodemetaError::io("write allocator state", &tmp, e))?;
    file.write_all(json.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| CodemetaError::io("write allocator state", &tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| CodemetaError::io("write allocator state", path, e))
}

/// Generate a legacy fixed-length random ID that `collides` rejects at most
/// [`MAX_RANDOM_ATTEMPTS`] times.
pub fn generate_random(length: usize, collides: impl Fn(&str) -> bool) -> Result<String> {
    let length = clamp_id_length(length as i64);
    let mut rng = rand::thread_rng();

    for attempt in 1..=MAX_RANDOM_ATTEMPTS {
        let id: String = (0..length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        if !collides(&id) {
            return Ok(id);
        }
        debug!("random id {} collided (attempt {})", id, attempt);
    }

    Err(CodemetaError::RandomCollision {
        attempts: MAX_RANDOM_ATTEMPTS,
    })
}
