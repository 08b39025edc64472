use serde_json::{Map, Value, json};

use crate::types::{ChatTurn, PromptContext};

/// 组装 Chat Completions 请求体 system 指令固定为首条消息
pub(crate) fn build_openai_body(context: &PromptContext) -> Value {
    let mut messages = vec![json!({
        "role": "system",
        "content": context.system_instruction,
    })];
    messages.extend(context.turns().map(convert_turn));

    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(context.model.clone()));
    body.insert("messages".to_string(), Value::Array(messages));
    body.insert("stream".to_string(), Value::Bool(true));
    Value::Object(body)
}

fn convert_turn(turn: &ChatTurn) -> Value {
    if turn.images.is_empty() {
        return json!({
            "role": turn.role.as_str(),
            "content": turn.content,
        });
    }

    // 多模态轮次改用分段表示 文本在前 图片按附件顺序追加
    let mut parts = vec![json!({"type": "text", "text": turn.content})];
    parts.extend(turn.images.iter().map(|image| {
        json!({
            "type": "image_url",
            "image_url": { "url": image }
        })
    }));
    json!({
        "role": turn.role.as_str(),
        "content": parts,
    })
}
