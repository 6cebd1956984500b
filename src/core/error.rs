//! Error taxonomy for persistence-backed operations
//!
//! Only conditions the caller has to act on are errors. Malformed headers,
//! unreadable files during a scan and random-ID collisions are recovered
//! where they happen.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodemetaError {
    #[error("{operation}: no workspace root is available to persist state")]
    NoWorkspaceRoot { operation: &'static str },

    #[error("{operation}: {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode allocator state at {path}: {source}")]
    State {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("allocate id: counter cannot advance past {last}")]
    IdSpaceExhausted { last: u64 },

    #[error("generate random id: gave up after {attempts} colliding attempts")]
    RandomCollision { attempts: usize },

    #[error("invalid set name {name:?}: {reason}")]
    InvalidSetName { name: String, reason: &'static str },

    #[error("invalid fragment id {id:?}: expected 1-32 decimal digits")]
    InvalidId { id: String },

    #[error("fragment {id} not found in any set")]
    FragmentNotFound { id: String },
}

impl CodemetaError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = CodemetaError> = std::result::Result<T, E>;
