use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::info;

use crate::error::ChatError;
use crate::types::{ChatTurn, PromptContext};

use super::{AppState, normalize};

/// POST /chat 的请求载荷
#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    pub messages: Vec<ChatTurn>,
    pub model: String,
    pub language: String,
}

/// Streams a model reply as Server-Sent Events.
///
/// Failures before the first upstream byte map to HTTP statuses through
/// [`ChatError`]. Once the upstream has accepted the request the response
/// commits with 200, and any later fault is folded into the stream as a
/// single error envelope followed by a normal close.
pub async fn stream_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Response, ChatError> {
    let Json(payload) =
        payload.map_err(|rejection| ChatError::validation(rejection.body_text()))?;
    if payload.messages.is_empty() {
        return Err(ChatError::validation("messages must not be empty"));
    }

    let (adapter, spec) = state.registry.adapter_for(&payload.model)?;
    let context = PromptContext::new(
        system_instruction(&payload.language),
        payload.messages,
        spec.id,
        Some(spec.max_output_tokens),
    )?;

    info!(model = spec.id, provider = adapter.name(), "opening chat stream");
    let fragments = adapter.stream_reply(&context).await?;

    let response = (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(normalize::envelope_stream(fragments))
            .keep_alive(KeepAlive::new().interval(Duration::from_secs(15))),
    );
    Ok(response.into_response())
}

/// 组装语言与产品身份指令 每次请求即时生成 不落库
fn system_instruction(language: &str) -> String {
    format!(
        "You are Kaiwa, a helpful assistant. Always respond in {language}. \
         If asked about your identity, say that you are the Kaiwa assistant; \
         do not name the upstream vendor or model that powers you."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_embeds_language_and_identity_policy() {
        let instruction = system_instruction("日本語");
        assert!(instruction.contains("respond in 日本語"));
        assert!(instruction.contains("Kaiwa"));
    }
}
