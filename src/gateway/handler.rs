use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument};

use crate::cache::INTERVUE_STATUS_HEADER;
use crate::gateway::error::GatewayError;
use crate::gateway::payload::{AnswerRequest, BatchRequest, SessionResponse, StartSessionRequest};
use crate::gateway::state::HandlerState;
use crate::session::SessionUpdate;

#[instrument(skip(state, request), fields(role = tracing::field::Empty))]
pub async fn start_session_handler(
    State(state): State<HandlerState>,
    Json(request): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let request: StartSessionRequest = parse_body(request)?;
    tracing::Span::current().record("role", tracing::field::display(&request.role));
    let update = state
        .orchestrator
        .start_session(&request.role, request.description.as_deref(), request.mode)
        .await?;
    debug!(session_id = %update.session.id, "Session created");
    Ok(make_response(StatusCode::CREATED, &update))
}

#[instrument(skip(state, request))]
pub async fn submit_answer_handler(
    State(state): State<HandlerState>,
    Path(session_id): Path<String>,
    Json(request): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let request: AnswerRequest = parse_body(request)?;
    let update = state
        .orchestrator
        .submit_answer_at(&session_id, request.question_index, &request.answer)
        .await?;
    Ok(make_response(StatusCode::OK, &update))
}

#[instrument(skip(state, request))]
pub async fn submit_batch_handler(
    State(state): State<HandlerState>,
    Path(session_id): Path<String>,
    Json(request): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let request: BatchRequest = parse_body(request)?;
    let update = state
        .orchestrator
        .submit_batch(&session_id, &request.answers)
        .await?;
    Ok(make_response(StatusCode::OK, &update))
}

#[instrument(skip(state))]
pub async fn get_session_handler(
    State(state): State<HandlerState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, GatewayError> {
    let session = state.orchestrator.get_session(&session_id).await?;
    Ok(Json(SessionResponse::from(&session)))
}

#[instrument(skip(state))]
pub async fn abandon_session_handler(
    State(state): State<HandlerState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, GatewayError> {
    let session = state.orchestrator.abandon_session(&session_id).await?;
    Ok(Json(SessionResponse::from(&session)))
}

#[instrument(skip(state))]
pub async fn stats_handler(State(state): State<HandlerState>) -> Response {
    Json(state.orchestrator.stats()).into_response()
}

fn parse_body<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, GatewayError> {
    serde_json::from_value(value)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request schema: {}", e)))
}

/// Session body plus the resolution of the newest question in `X-Intervue-Status`.
pub(crate) fn make_response(status: StatusCode, update: &SessionUpdate) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(resolution) = update.resolution {
        headers.insert(
            INTERVUE_STATUS_HEADER,
            HeaderValue::from_static(resolution.as_header_value()),
        );
    }
    (status, headers, Json(SessionResponse::from(update))).into_response()
}
