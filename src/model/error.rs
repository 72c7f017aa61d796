use std::time::Duration;
use thiserror::Error;

/// Every way the remote model can fail. The engine always recovers from these.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("model request failed: {0}")]
    Request(String),

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("model returned {got} evaluations for {expected} answers")]
    CountMismatch { expected: usize, got: usize },
}

pub type ModelResult<T> = Result<T, ModelError>;
