use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ChatError;
use crate::storage::HistoryBuckets;
use crate::types::ChatMessage;

use super::AppState;

/// POST /chat/save 的请求载荷
#[derive(Debug, Deserialize)]
pub struct SavePayload {
    pub message: ChatMessage,
}

/// PUT /chat/{id}/update 的请求载荷
#[derive(Debug, Deserialize)]
pub struct RenamePayload {
    pub title: Option<String>,
}

/// Upserts a single message. Clients retry saves freely; replays of an
/// already-stored message id overwrite in place.
pub async fn save_message(
    State(state): State<AppState>,
    payload: Result<Json<SavePayload>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ChatError> {
    let Json(payload) =
        payload.map_err(|rejection| ChatError::validation(rejection.body_text()))?;
    let message = payload.message;
    if message.id.trim().is_empty() || message.conversation_id.trim().is_empty() {
        return Err(ChatError::validation("message id and chatId are required"));
    }
    debug!(
        message_id = %message.id,
        conversation_id = %message.conversation_id,
        role = message.role.as_str(),
        "saving message"
    );
    state.repository.upsert_message(message);
    Ok(Json(json!({ "success": true })))
}

/// 按本地时区日界返回分桶历史
pub async fn history(State(state): State<AppState>) -> Json<HistoryBuckets> {
    Json(state.repository.history(Local::now()))
}

/// Soft-deletes a conversation. Unknown ids and repeat deletes yield 404.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    if state.repository.soft_delete(&id) {
        Json(json!({ "success": true })).into_response()
    } else {
        not_found()
    }
}

/// Renames a conversation. Titles are trimmed; blank results are rejected.
pub async fn rename_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RenamePayload>, JsonRejection>,
) -> Result<Response, ChatError> {
    let Json(payload) =
        payload.map_err(|rejection| ChatError::validation(rejection.body_text()))?;
    let title = payload.title.unwrap_or_default();
    let title = title.trim();
    if title.is_empty() {
        return Err(ChatError::validation("title must not be blank"));
    }
    if state.repository.rename(&id, title) {
        Ok(Json(json!({ "success": true })).into_response())
    } else {
        Ok(not_found())
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "conversation not found" })),
    )
        .into_response()
}
