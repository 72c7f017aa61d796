use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BankError {
    #[error("failed to read question bank {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid question bank: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported question bank version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("question bank has no '{0}' pool")]
    MissingGeneralPool(&'static str),
}

pub type BankResult<T> = Result<T, BankError>;
