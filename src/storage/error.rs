use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by a [`KvStore`](super::KvStore) backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("write failed for key '{key}': {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("corrupt record at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    TaskFailed(String),

    #[error("storage path unavailable: {path}")]
    StorageUnavailable { path: PathBuf },
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
