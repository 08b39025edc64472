//! HTTP surface of the gateway: routing, shared state, and error mapping.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

use crate::error::ChatError;
use crate::registry::AdapterRegistry;
use crate::storage::ChatRepository;

pub mod chat;
pub mod normalize;
pub mod persistence;

/// 路由层共享状态
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AdapterRegistry>,
    pub repository: ChatRepository,
}

/// Builds the gateway router. CORS stays permissive so browser front ends
/// on any origin can stream.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat::stream_chat))
        .route("/chat/save", post(persistence::save_message))
        .route("/chat/history", get(persistence::history))
        .route("/chat/{id}/delete", post(persistence::delete_conversation))
        .route("/chat/{id}/update", put(persistence::rename_conversation))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Pre-stream failures map to statuses here; once the SSE stream has
/// started, errors are folded into the stream instead and never reach this
/// impl.
impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = if self.is_rate_limit() {
            StatusCode::TOO_MANY_REQUESTS
        } else {
            match &self {
                ChatError::Validation { .. } | ChatError::UnsupportedModel { .. } => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
