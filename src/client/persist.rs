//! 保存管道 聊天路径只入队 网关写入由后台任务完成

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::types::ChatMessage;

/// Sending half of the persistence pipeline.
///
/// Enqueueing never blocks the chat path: when the queue is full or the
/// worker is gone, the message is dropped with a warning. The gateway's
/// upsert makes replays harmless, so a dropped save only loses durability
/// for that one message.
#[derive(Clone)]
pub struct SaveQueue {
    tx: mpsc::Sender<ChatMessage>,
}

impl SaveQueue {
    /// 尝试入队 失败只告警不阻塞
    pub fn enqueue(&self, message: ChatMessage) {
        if let Err(err) = self.tx.try_send(message) {
            warn!(error = %err, "save queue rejected message");
        }
    }
}

/// Background half of the persistence pipeline.
///
/// Owns the receiving end of the queue and posts one message at a time to
/// the gateway's save endpoint. It exits once every [`SaveQueue`] clone has
/// been dropped and the backlog is drained, which makes shutdown a matter
/// of dropping the client and awaiting the worker task.
pub struct SaveWorker {
    pub(crate) rx: mpsc::Receiver<ChatMessage>,
    transport: DynHttpTransport,
    base_url: String,
}

impl SaveWorker {
    /// 顺序消费队列 直到所有发送端关闭
    pub async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            let message_id = message.id.clone();
            if let Err(err) = self.save(message).await {
                warn!(message_id = %message_id, error = %err, "failed to persist message");
            }
        }
        debug!("save worker drained");
    }

    async fn save(&self, message: ChatMessage) -> Result<(), ChatError> {
        let body = serde_json::to_vec(&serde_json::json!({ "message": message }))
            .map_err(|err| ChatError::validation(format!("failed to serialize save request: {err}")))?;
        let url = format!("{}/chat/save", self.base_url.trim_end_matches('/'));
        let response = self.transport.send(HttpRequest::post_json(url, body)).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(ChatError::transport(format!(
                "save rejected with status {}",
                response.status
            )))
        }
    }
}

/// Builds a connected queue/worker pair.
///
/// `capacity` bounds how many unsent messages may pile up while the gateway
/// is unreachable before [`SaveQueue::enqueue`] starts shedding.
pub fn save_pipeline(
    transport: DynHttpTransport,
    base_url: impl Into<String>,
    capacity: usize,
) -> (SaveQueue, SaveWorker) {
    let (tx, rx) = mpsc::channel(capacity);
    let worker = SaveWorker {
        rx,
        transport,
        base_url: base_url.into(),
    };
    (SaveQueue { tx }, worker)
}
