//! HTTP API for the stream gateway
//!
//! - `POST /api/auth/validate` - Check Twitch client credentials
//! - `POST /api/stream/start` - Start a test-pattern stream
//! - `POST /api/stream/stop` - Stop every active stream
//! - `GET /api/stream/status` - Live streams (prunes exited encoders)
//! - `GET /api/stream/sessions/:id` - One session
//! - `DELETE /api/stream/sessions/:id` - Stop one session
//! - `GET /api/ws/stream` - WebSocket status feed
//! - `GET /api/health` - Liveness
//! - `GET /metrics` - Lifecycle counters

pub mod auth;
pub mod error;
pub mod stream;
pub mod ws;

pub use error::{ApiError, ErrorResponse};

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use twitchcast_session::{MetricsSnapshot, SessionManager, StatusBroadcaster};

use crate::config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Session lifecycle manager
    pub session_manager: Arc<SessionManager>,
    /// Status feed for WebSocket observers
    pub broadcaster: Arc<StatusBroadcaster>,
    /// Service configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(
        session_manager: Arc<SessionManager>,
        broadcaster: Arc<StatusBroadcaster>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            session_manager,
            broadcaster,
            config,
        }
    }
}

/// Build the HTTP API router
pub fn build_router(state: AppState) -> Router {
    // Browser frontend is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/validate", post(auth::validate_credentials))
        // Stream endpoints
        .route("/api/stream/start", post(stream::start_stream))
        .route("/api/stream/stop", post(stream::stop_stream))
        .route("/api/stream/status", get(stream::stream_status))
        .route(
            "/api/stream/sessions/:id",
            get(stream::get_session).delete(stream::delete_session),
        )
        // Status feed
        .route("/api/ws/stream", get(ws_upgrade))
        // Health and metrics
        .route("/api/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// WebSocket upgrade handler
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| ws::handle_ws(socket, state.broadcaster.clone()))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_streams: usize,
    pub websocket_connections: usize,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_streams = state.session_manager.status().await.active_streams;
    let websocket_connections = state.broadcaster.connection_count().await;

    Json(HealthResponse {
        status: "healthy",
        active_streams,
        websocket_connections,
    })
}

/// Metrics endpoint
async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.session_manager.metrics().snapshot())
}
