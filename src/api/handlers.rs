//! API handlers for the chat endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::api::models::{error_codes, ApiError, ChatRequestBody, HealthResponse};
use crate::context::{ChatOrchestrator, ChatPath, ChatRequest, ChatResponse};
use crate::llm::CapabilityError;
use crate::metrics::METRICS;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ChatOrchestrator>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::up())
}

/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_prometheus(),
    )
}

/// Chat with compaction: the compactor summarizes long histories first
///
/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequestBody>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    run_chat(state, ChatPath::Compacted, payload).await
}

/// Chat without compaction, full history sent to the inference model
///
/// POST /api/chat-raw
pub async fn chat_raw(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequestBody>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    run_chat(state, ChatPath::Raw, payload).await
}

async fn run_chat(
    state: AppState,
    path: ChatPath,
    payload: Result<Json<ChatRequestBody>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let start = Instant::now();

    let request: ChatRequest = match payload {
        Ok(Json(body)) => body.into(),
        Err(rejection) => {
            warn!("Rejected chat request: {}", rejection.body_text());
            METRICS.record_chat(path.as_str(), false, start.elapsed());
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ApiError::new(error_codes::VALIDATION_ERROR, rejection.body_text())),
            ));
        }
    };

    let span = info_span!(
        "chat",
        request_id = %Uuid::new_v4(),
        path = path.as_str(),
        turns = request.history.len()
    );

    let result = async {
        match path {
            ChatPath::Compacted => state.orchestrator.compacted_chat(&request).await,
            ChatPath::Raw => state.orchestrator.raw_chat(&request).await,
        }
    }
    .instrument(span)
    .await;

    METRICS.record_chat(path.as_str(), result.is_ok(), start.elapsed());

    result.map(Json).map_err(|e| {
        error!("Chat request failed on {} path: {}", path.as_str(), e);
        capability_error_response(e)
    })
}

/// Map a model failure onto an HTTP status and error body
pub fn capability_error_response(e: CapabilityError) -> (StatusCode, Json<ApiError>) {
    let (status, code) = match &e {
        CapabilityError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, error_codes::TIMEOUT),
        CapabilityError::CircuitOpen(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, error_codes::UPSTREAM_UNAVAILABLE)
        }
        CapabilityError::Configuration(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
        }
        CapabilityError::Request(_)
        | CapabilityError::Upstream { .. }
        | CapabilityError::InvalidResponse(_) => (StatusCode::BAD_GATEWAY, error_codes::UPSTREAM_ERROR),
    };

    (status, Json(ApiError::new(code, e.to_string())))
}
