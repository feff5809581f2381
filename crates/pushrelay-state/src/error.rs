use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while persisting state.
///
/// Loading never fails: unreadable or corrupt files are logged and treated
/// as empty state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;
