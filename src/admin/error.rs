use std::path::{Path, PathBuf};

use crate::index::ConfigError;
use crate::types::IndexError;
use thiserror::Error;

/// Error type for administrative operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Snapshot file not found at the specified path.
    #[error("snapshot not found: {0}")]
    MissingSnapshot(PathBuf),
    /// Custom error message.
    #[error("{0}")]
    Message(String),
    /// Schema index error.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Index configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// CSV decoding error.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// JSON encoding error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for administrative operations.
pub type Result<T> = std::result::Result<T, AdminError>;

impl AdminError {
    pub(crate) fn missing_snapshot(path: impl AsRef<Path>) -> Self {
        AdminError::MissingSnapshot(path.as_ref().to_path_buf())
    }
}
