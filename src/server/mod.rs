mod pane;
mod sessions;
mod stream;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::agents::AgentRegistry;
use crate::app::Config;
use crate::monitor::SnapshotHub;
use crate::tmux::{TmuxClient, TmuxError};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub tmux: Arc<TmuxClient>,
    pub registry: Arc<AgentRegistry>,
    pub hub: Arc<SnapshotHub>,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sessions", get(sessions::get_sessions))
        .route("/api/pane/{target}", get(pane::get_pane))
        .route("/api/pane/{target}/ws", get(stream::pane_ws))
        .route("/api/pane/{target}/send", post(pane::send_input))
        .route("/api/pane/{target}/kill", post(pane::kill_pane))
        .route("/api/pane/{target}/respawn", post(pane::respawn_pane))
        .route("/api/pane/{target}/kill-window", post(pane::kill_window))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// HTTP mapping for handler failures: vanished targets are 404, a down
/// multiplexer is 503, anything else is a 500.
pub enum ApiError {
    NotFound(String),
    Tmux(TmuxError),
}

impl From<TmuxError> for ApiError {
    fn from(e: TmuxError) -> Self {
        ApiError::Tmux(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, what).into_response(),
            ApiError::Tmux(TmuxError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, what).into_response()
            }
            ApiError::Tmux(TmuxError::NoServer) => {
                (StatusCode::SERVICE_UNAVAILABLE, "no tmux server running").into_response()
            }
            ApiError::Tmux(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}
