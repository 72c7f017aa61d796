use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::cache::INTERVUE_STATUS_HEADER;
use crate::session::EngineError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session conflict: {0}")]
    SessionConflict(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("question closed: {0}")]
    QuestionClosed(String),
}

impl From<EngineError> for GatewayError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidInput(msg) => GatewayError::InvalidRequest(msg),
            EngineError::SessionNotFound(id) => GatewayError::SessionNotFound(id),
            e @ EngineError::SessionTerminal { .. } => GatewayError::SessionConflict(e.to_string()),
            e @ EngineError::QuestionClosed { .. } => GatewayError::QuestionClosed(e.to_string()),
            EngineError::Storage(e) => GatewayError::StorageError(e.to_string()),
        }
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, intervue_status) = match &self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
            GatewayError::SessionConflict(_) => (StatusCode::CONFLICT, "session_terminal"),
            GatewayError::StorageError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
            GatewayError::QuestionClosed(_) => (StatusCode::CONFLICT, "question_closed"),
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            INTERVUE_STATUS_HEADER,
            HeaderValue::from_static(intervue_status),
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
