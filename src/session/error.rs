use thiserror::Error;

use super::types::SessionStatus;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {id} is already {status:?}")]
    SessionTerminal { id: String, status: SessionStatus },

    #[error("question {question_index} is no longer pending (pending: {pending})")]
    QuestionClosed { question_index: usize, pending: usize },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl EngineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
