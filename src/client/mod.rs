//! 网关原生客户端 发起聊天流并维护本地会话状态
//!
//! 三部分协作 [`ConversationStore`] 保存本地消息视图
//! [`consumer::consume_stream`] 把 SSE 信封折叠进占位消息
//! [`persist::SaveWorker`] 在后台把消息写回网关

pub mod consumer;
pub mod persist;
pub mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures_util::future::{AbortHandle, Abortable, Aborted};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::ChatError;
use crate::gateway::normalize::STREAM_FAILURE_TEXT;
use crate::http::{DynHttpTransport, HttpBodyStream, HttpRequest};
use crate::provider::collect_error_body;
use crate::storage::HistoryBuckets;
use crate::types::{ChatMessage, ChatTurn, Role};

pub use consumer::consume_stream;
pub use persist::{SaveQueue, SaveWorker, save_pipeline};
pub use store::ConversationStore;

/// 保存队列容量 网关长时间不可达时开始丢弃
const SAVE_QUEUE_CAPACITY: usize = 64;

/// Handles produced by one dispatched chat turn.
#[derive(Debug)]
pub struct SendOutcome {
    pub user_message_id: String,
    pub assistant_message_id: String,
    /// Drives the stream consumer; await it to observe completion in tests.
    pub task: JoinHandle<()>,
}

/// Chat client speaking the gateway's own wire protocol.
///
/// At most one stream is in flight: dispatching a new turn aborts the
/// previous consumer, freezing its placeholder at whatever content had
/// already arrived. The aborted consumer performs no further writes and its
/// placeholder is never handed to the save queue.
pub struct ChatClient {
    transport: DynHttpTransport,
    base_url: String,
    store: Arc<Mutex<ConversationStore>>,
    active: Option<AbortHandle>,
}

impl ChatClient {
    /// Builds a client plus the save worker that must be spawned alongside
    /// it. The worker exits once the client (and every queue clone) is
    /// dropped and the backlog is drained.
    pub fn new(transport: DynHttpTransport, base_url: impl Into<String>) -> (Self, SaveWorker) {
        let base_url = base_url.into();
        let (queue, worker) = persist::save_pipeline(
            transport.clone(),
            base_url.clone(),
            SAVE_QUEUE_CAPACITY,
        );
        let client = Self {
            transport,
            base_url,
            store: Arc::new(Mutex::new(ConversationStore::new(queue))),
            active: None,
        };
        (client, worker)
    }

    /// Shared handle to the local conversation store.
    pub fn store(&self) -> Arc<Mutex<ConversationStore>> {
        Arc::clone(&self.store)
    }

    /// Sends one user turn and starts streaming the reply.
    ///
    /// The user message and an empty assistant placeholder are stored before
    /// the request leaves, so the conversation renders immediately. The
    /// returned [`SendOutcome`] carries both message ids and the consumer
    /// task handle.
    ///
    /// # Errors
    ///
    /// Returns an error when the gateway rejects the request before any
    /// stream opens; the placeholder is then frozen at the failure text.
    pub async fn send_message(
        &mut self,
        conversation_id: &str,
        content: impl Into<String>,
        images: Vec<String>,
        model: &str,
        language: &str,
    ) -> Result<SendOutcome, ChatError> {
        if let Some(previous) = self.active.take() {
            debug!("superseding in-flight stream");
            previous.abort();
        }

        let user_message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role: Role::User,
            content: content.into(),
            model: model.to_string(),
            timestamp: Utc::now(),
            images,
        };
        let user_message_id = user_message.id.clone();

        let turns: Vec<ChatTurn>;
        let assistant_message_id;
        {
            let mut store = lock(&self.store);
            store.add_message(user_message);
            turns = store
                .conversation_messages(conversation_id)
                .into_iter()
                .map(|message| ChatTurn {
                    role: message.role,
                    content: message.content.clone(),
                    images: message.images.clone(),
                })
                .collect();

            let placeholder = ChatMessage {
                id: Uuid::new_v4().to_string(),
                conversation_id: conversation_id.to_string(),
                role: Role::Assistant,
                content: String::new(),
                model: model.to_string(),
                timestamp: Utc::now(),
                images: Vec::new(),
            };
            assistant_message_id = placeholder.id.clone();
            store.add_message(placeholder);
            store.set_streaming(true);
        }

        let body = match self.open_chat_stream(turns, model, language).await {
            Ok(body) => body,
            Err(err) => {
                let mut store = lock(&self.store);
                store.update_message(&assistant_message_id, STREAM_FAILURE_TEXT.to_string());
                store.set_streaming(false);
                return Err(err);
            }
        };

        let (abort_handle, registration) = AbortHandle::new_pair();
        let store = Arc::clone(&self.store);
        let placeholder_id = assistant_message_id.clone();
        let task = tokio::spawn(async move {
            let consumer = consumer::consume_stream(body, Arc::clone(&store), &placeholder_id);
            match Abortable::new(consumer, registration).await {
                Ok(Ok(())) => {
                    let mut store = lock(&store);
                    store.finalize_message(&placeholder_id);
                    store.set_streaming(false);
                }
                Ok(Err(err)) => {
                    error!(error = %err, "chat stream failed");
                    let mut store = lock(&store);
                    store.update_message(&placeholder_id, STREAM_FAILURE_TEXT.to_string());
                    store.set_streaming(false);
                }
                Err(Aborted) => {
                    debug!("chat stream superseded before completion");
                }
            }
        });
        self.active = Some(abort_handle);

        info!(conversation_id = %conversation_id, model = %model, "chat turn dispatched");
        Ok(SendOutcome {
            user_message_id,
            assistant_message_id,
            task,
        })
    }

    /// Fetches persisted history and merges it into the local store without
    /// re-persisting anything.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Transport`] when the request fails or the
    /// response cannot be parsed.
    pub async fn load_history(&self) -> Result<HistoryBuckets, ChatError> {
        let url = format!("{}/chat/history", self.base_url.trim_end_matches('/'));
        let response = self.transport.send(HttpRequest::get(url)).await?;
        if !response.is_success() {
            return Err(ChatError::transport(format!(
                "history request failed with status {}",
                response.status
            )));
        }
        let text = response.into_string()?;
        let buckets: HistoryBuckets = serde_json::from_str(&text)
            .map_err(|err| ChatError::transport(format!("failed to parse history: {err}")))?;
        lock(&self.store).hydrate(&buckets);
        Ok(buckets)
    }

    /// 打开聊天流 非 2xx 时解析网关的错误负载
    async fn open_chat_stream(
        &self,
        turns: Vec<ChatTurn>,
        model: &str,
        language: &str,
    ) -> Result<HttpBodyStream, ChatError> {
        let body = serde_json::to_vec(&serde_json::json!({
            "messages": turns,
            "model": model,
            "language": language,
        }))
        .map_err(|err| ChatError::validation(format!("failed to serialize chat request: {err}")))?;

        let url = format!("{}/chat", self.base_url.trim_end_matches('/'));
        let headers = HashMap::from([
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "text/event-stream".to_string()),
        ]);
        let request = HttpRequest::post_json(url, body).with_headers(headers);

        let response = self.transport.send_stream(request).await?;
        if (200..300).contains(&response.status) {
            return Ok(response.body);
        }

        let status = response.status;
        let detail = collect_error_body(response.body, "kaiwa_gateway")
            .await
            .ok()
            .and_then(|text| parse_error_field(&text))
            .unwrap_or_else(|| format!("gateway returned status {status}"));
        Err(ChatError::transport(detail))
    }
}

/// 网关错误负载固定为 {"error": "..."}
fn parse_error_field(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|detail| detail.as_str())
                .map(ToString::to_string)
        })
}

fn lock(store: &Arc<Mutex<ConversationStore>>) -> MutexGuard<'_, ConversationStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_field_parsing_tolerates_other_shapes() {
        assert_eq!(
            parse_error_field(r#"{"error":"unknown model"}"#).as_deref(),
            Some("unknown model")
        );
        assert!(parse_error_field(r#"{"message":"nope"}"#).is_none());
        assert!(parse_error_field("<html>busy</html>").is_none());
    }
}
