//! HTTP gateway (Axum) over the session orchestrator.
//!
//! This module is primarily used by the `intervue` server binary.

pub mod error;
pub mod handler;
pub mod payload;
pub mod state;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::{
    abandon_session_handler, get_session_handler, start_session_handler, stats_handler,
    submit_answer_handler, submit_batch_handler,
};
pub use state::HandlerState;

use crate::cache::{
    INTERVUE_STATUS_ERROR, INTERVUE_STATUS_HEADER, INTERVUE_STATUS_HEALTHY,
    INTERVUE_STATUS_NOT_READY, INTERVUE_STATUS_READY,
};

pub fn create_router_with_state(state: HandlerState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/v1/stats", get(stats_handler))
        .route("/v1/sessions", post(start_session_handler))
        .route(
            "/v1/sessions/{id}",
            get(get_session_handler).delete(abandon_session_handler),
        )
        .route("/v1/sessions/{id}/answers", post(submit_answer_handler))
        .route("/v1/sessions/{id}/batch", post(submit_batch_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub storage: &'static str,
    pub storage_mode: &'static str,
    pub model: String,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        INTERVUE_STATUS_HEADER,
        HeaderValue::from_static(INTERVUE_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

/// Ready once the store is reachable. An offline model does not block readiness.
#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<HandlerState>) -> Response {
    let (storage, storage_mode) = match &state.storage_path {
        Some(path) if path.is_dir() => (INTERVUE_STATUS_READY, "fs"),
        Some(_) => (INTERVUE_STATUS_ERROR, "fs"),
        None => (INTERVUE_STATUS_READY, "memory"),
    };

    let components = ComponentStatus {
        http: INTERVUE_STATUS_READY,
        storage,
        storage_mode,
        model: state.orchestrator.model_name().to_string(),
    };

    let is_ready = components.storage == INTERVUE_STATUS_READY;
    let (status_code, status_msg) = if is_ready {
        (StatusCode::OK, INTERVUE_STATUS_READY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, INTERVUE_STATUS_NOT_READY)
    };

    let mut headers = HeaderMap::new();
    headers.insert(INTERVUE_STATUS_HEADER, HeaderValue::from_static(status_msg));

    (
        status_code,
        headers,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}
