//! Stream lifecycle endpoints
//!
//! Handles starting, stopping and querying streams.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use twitchcast_session::{Credentials, SessionId, SessionView, StatusReport, StreamConfig};

use super::{ApiError, AppState};

/// Request body for starting a stream
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamRequest {
    pub credentials: Credentials,

    #[serde(default)]
    pub stream_config: StreamConfig,
}

/// Response body for a started stream
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamResponse {
    pub success: bool,
    pub message: String,

    /// Public channel URL; never the ingest URL
    pub stream_url: String,

    pub session_id: SessionId,
}

/// Response body for stopping streams
#[derive(Debug, Serialize)]
pub struct StopStreamResponse {
    pub success: bool,
    pub message: String,
}

/// Start streaming to Twitch
///
/// POST /api/stream/start
pub async fn start_stream(
    State(state): State<AppState>,
    payload: Result<Json<StartStreamRequest>, JsonRejection>,
) -> Result<Json<StartStreamResponse>, ApiError> {
    let Json(req) = payload?;

    let started = state
        .session_manager
        .start(&req.credentials, req.stream_config)
        .await?;

    tracing::info!(session_id = %started.session_id, "Stream started successfully");

    Ok(Json(StartStreamResponse {
        success: true,
        message: "Stream started successfully".to_string(),
        stream_url: state.config.channel_url(),
        session_id: started.session_id,
    }))
}

/// Stop all active streams
///
/// POST /api/stream/stop
pub async fn stop_stream(State(state): State<AppState>) -> Json<StopStreamResponse> {
    let stopped = state.session_manager.stop_all().await;

    Json(StopStreamResponse {
        success: true,
        message: format!("Stopped {} active stream(s)", stopped),
    })
}

/// Current streaming status
///
/// GET /api/stream/status
pub async fn stream_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.session_manager.status().await)
}

/// Get one session
///
/// GET /api/stream/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.session_manager.session(&id).await?))
}

/// Stop one session
///
/// DELETE /api/stream/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id)?;
    state.session_manager.stop(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::parse(raw).ok_or_else(|| ApiError::not_found(format!("Session {} not found", raw)))
}
