//! Shared data structures modeling conversations, prompt contexts, and the
//! outbound stream envelope.
//!
//! These types normalize the gateway's wire shapes so adapters, routes, and
//! the native client stay agnostic of individual provider differences.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// 会话消息的显示标题上限 超出部分截断
pub const TITLE_MAX_CHARS: usize = 100;

/// Conversation role. Only the two roles that appear in a transcript exist;
/// system instructions are injected per provider and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// 角色的线格式名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A persisted (or about-to-be-persisted) conversation message.
///
/// Within a conversation, messages are append-only except for the trailing
/// assistant placeholder, whose `content` is repeatedly overwritten while its
/// stream is open and frozen once the stream closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique within a conversation; minted by the sender.
    pub id: String,
    #[serde(rename = "chatId")]
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    /// Catalog identifier of the model that produced or will produce it.
    pub model: String,
    pub timestamp: DateTime<Utc>,
    /// Inline image payloads, URL or data-URI form, in attachment order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// 入站聊天请求中的一轮消息 不携带持久化字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatTurn {
    /// 构造纯文本轮次
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }
}

/// Ephemeral per-call context handed to a provider adapter. Never persisted.
#[derive(Debug, Clone)]
pub struct PromptContext {
    /// Product instruction embedding the response language and identity policy.
    pub system_instruction: String,
    /// Every turn before the in-flight one, oldest first.
    pub history: Vec<ChatTurn>,
    /// The in-flight turn, including its image attachments.
    pub current: ChatTurn,
    /// Provider-native model identifier for this call.
    pub model: String,
    /// Output budget from the model catalog, where the provider requires one.
    pub max_output_tokens: Option<u32>,
}

impl PromptContext {
    /// Splits an ordered turn list into history plus the in-flight turn.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Validation`] when `turns` is empty.
    pub fn new(
        system_instruction: impl Into<String>,
        mut turns: Vec<ChatTurn>,
        model: impl Into<String>,
        max_output_tokens: Option<u32>,
    ) -> Result<Self, ChatError> {
        let current = turns
            .pop()
            .ok_or_else(|| ChatError::validation("conversation requires at least one turn"))?;
        Ok(Self {
            system_instruction: system_instruction.into(),
            history: turns,
            current,
            model: model.into(),
            max_output_tokens,
        })
    }

    /// 按时间顺序遍历全部轮次 最后一项为当前轮
    pub fn turns(&self) -> impl Iterator<Item = &ChatTurn> {
        self.history.iter().chain(std::iter::once(&self.current))
    }
}

/// Raw image bytes extracted from a data-URI, with their declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Decodes a `data:<mime>;base64,<payload>` URI into bytes plus MIME type.
///
/// Returns `None` for anything else, including plain URLs; callers that can
/// only embed raw bytes skip those attachments.
///
/// # Examples
///
/// ```
/// use kaiwa::types::parse_data_uri;
///
/// let image = parse_data_uri("data:image/png;base64,aGk=").unwrap();
/// assert_eq!(image.mime_type, "image/png");
/// assert_eq!(image.data, b"hi");
/// assert!(parse_data_uri("https://example.com/cat.png").is_none());
/// ```
pub fn parse_data_uri(value: &str) -> Option<InlineImage> {
    let rest = value.strip_prefix("data:")?;
    let (mime_type, payload) = rest.split_once(";base64,")?;
    if mime_type.is_empty() {
        return None;
    }
    let data = general_purpose::STANDARD.decode(payload.trim()).ok()?;
    Some(InlineImage {
        mime_type: mime_type.to_string(),
        data,
    })
}

/// 由首条用户消息派生会话标题 按字符截断
pub fn derive_title(content: &str) -> String {
    content.chars().take(TITLE_MAX_CHARS).collect()
}

/// One unit of the outbound streaming wire format.
///
/// Ordinary fragments serialize exactly as `{"content":"..."}`; the single
/// folded error a stream may end with serializes as
/// `{"kind":"error","content":"..."}`, which a reader that only understands
/// the plain shape still renders as text.
///
/// # Examples
///
/// ```
/// use kaiwa::types::StreamEnvelope;
///
/// let wire = serde_json::to_string(&StreamEnvelope::content("hi")).unwrap();
/// assert_eq!(wire, r#"{"content":"hi"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEnvelope {
    #[serde(default, skip_serializing_if = "EnvelopeKind::is_content")]
    pub kind: EnvelopeKind,
    pub content: String,
}

/// 信封类别 缺省为普通内容
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    #[default]
    Content,
    Error,
}

impl EnvelopeKind {
    fn is_content(&self) -> bool {
        matches!(self, EnvelopeKind::Content)
    }
}

impl StreamEnvelope {
    /// 普通内容信封
    pub fn content(fragment: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::Content,
            content: fragment.into(),
        }
    }

    /// 流内错误信封
    pub fn error(notice: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::Error,
            content: notice.into(),
        }
    }
}
