use serde_json::{Map, Value, json};

use crate::types::PromptContext;

const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// 构建 Anthropic Messages 请求体
///
/// 系统指令作为首条 assistant 消息注入, 其后按原顺序排列对话轮次。
/// 该通道仅传文本, 图片附件不随轮次下发。
pub(crate) fn build_anthropic_body(context: &PromptContext) -> Value {
    let mut messages = vec![json!({
        "role": "assistant",
        "content": context.system_instruction,
    })];
    messages.extend(context.turns().map(|turn| {
        json!({
            "role": turn.role.as_str(),
            "content": turn.content,
        })
    }));

    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(context.model.clone()));
    // max_tokens 为 Messages API 必填字段
    body.insert(
        "max_tokens".to_string(),
        Value::from(context.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
    );
    body.insert("temperature".to_string(), Value::from(DEFAULT_TEMPERATURE));
    body.insert("messages".to_string(), Value::Array(messages));
    body.insert("stream".to_string(), Value::Bool(true));
    Value::Object(body)
}
