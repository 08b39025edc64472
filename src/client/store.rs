//! 客户端会话内存视图 以及写回网关的触发点

use std::collections::HashMap;

use tracing::debug;

use crate::storage::HistoryBuckets;
use crate::types::{ChatMessage, Role, derive_title};

use super::persist::SaveQueue;

/// Local mirror of every conversation the client knows about.
///
/// Messages live in arrival order in one flat list; conversation views are
/// filtered out of it on demand. The store also decides when a message is
/// handed to the save queue: user messages on arrival, assistant messages
/// only when their stream finishes cleanly.
pub struct ConversationStore {
    messages: Vec<ChatMessage>,
    titles: HashMap<String, String>,
    queue: SaveQueue,
    streaming: bool,
}

impl ConversationStore {
    pub fn new(queue: SaveQueue) -> Self {
        Self {
            messages: Vec::new(),
            titles: HashMap::new(),
            queue,
            streaming: false,
        }
    }

    /// Appends a message, seeding the conversation title from the first user
    /// message of a new conversation and persisting user turns right away.
    pub fn add_message(&mut self, message: ChatMessage) {
        if message.role == Role::User {
            if !self.titles.contains_key(&message.conversation_id) {
                self.titles.insert(
                    message.conversation_id.clone(),
                    derive_title(&message.content),
                );
            }
            self.queue.enqueue(message.clone());
        }
        self.messages.push(message);
    }

    /// Overwrites the content of the message with `id`. Returns whether a
    /// message was found; repeated calls with the same content are no-ops
    /// from the reader's point of view.
    pub fn update_message(&mut self, id: &str, content: String) -> bool {
        match self.messages.iter().position(|message| message.id == id) {
            Some(index) => {
                self.messages[index].content = content;
                true
            }
            None => false,
        }
    }

    /// Hands the finished assistant message to the save queue.
    ///
    /// 仅 assistant 消息会写回 其余角色在到达时已入队
    pub fn finalize_message(&mut self, id: &str) {
        match self.messages.iter().find(|message| message.id == id) {
            Some(message) if message.role == Role::Assistant => {
                self.queue.enqueue(message.clone());
            }
            Some(_) => {}
            None => debug!(message_id = %id, "finalize target no longer present"),
        }
    }

    /// Loads persisted history into the store without re-persisting any of
    /// it. Messages already present by id are left untouched.
    pub fn hydrate(&mut self, buckets: &HistoryBuckets) {
        let views = buckets
            .today
            .iter()
            .chain(&buckets.yesterday)
            .chain(&buckets.previous_seven_days)
            .chain(&buckets.older);
        for view in views {
            self.titles.insert(view.id.clone(), view.title.clone());
            for message in &view.messages {
                if !self.messages.iter().any(|known| known.id == message.id) {
                    self.messages.push(message.clone());
                }
            }
        }
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|message| message.id == id)
    }

    /// 指定会话的消息 按到达顺序
    pub fn conversation_messages(&self, conversation_id: &str) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|message| message.conversation_id == conversation_id)
            .collect()
    }

    pub fn title(&self, conversation_id: &str) -> Option<&str> {
        self.titles.get(conversation_id).map(String::as_str)
    }
}
