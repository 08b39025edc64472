use base64::{Engine as _, engine::general_purpose};
use serde_json::{Map, Value, json};

use crate::types::{PromptContext, Role, parse_data_uri};

/// 构建 Gemini streamGenerateContent 请求体
///
/// Gemini 不接受独立的 system 角色轮次, 系统指令被拼接进最后一轮用户
/// 消息的文本里。模型名称走 URL 路径, 因此不出现在 body 中。
pub(crate) fn build_gemini_body(context: &PromptContext) -> Value {
    // 1. 历史轮次按原顺序进入 contents assistant 映射为 model
    let mut contents: Vec<Value> = context
        .history
        .iter()
        .map(|turn| {
            json!({
                "role": map_role(turn.role),
                "parts": [ { "text": turn.content } ]
            })
        })
        .collect();

    // 2. 当前轮承载系统指令与图片附件
    let mut parts = vec![json!({
        "text": format!("{}\n\n{}", context.system_instruction, context.current.content)
    })];
    for image in &context.current.images {
        // 仅内联 data URI 图片 其余形式跳过
        if let Some(inline) = parse_data_uri(image) {
            parts.push(json!({
                "inlineData": {
                    "mimeType": inline.mime_type,
                    "data": general_purpose::STANDARD.encode(&inline.data),
                }
            }));
        }
    }
    contents.push(json!({ "role": "user", "parts": parts }));

    let mut body = Map::new();
    body.insert("contents".to_string(), Value::Array(contents));

    // 3. 输出预算进入 generationConfig
    if let Some(max_tokens) = context.max_output_tokens {
        body.insert(
            "generationConfig".to_string(),
            json!({ "maxOutputTokens": max_tokens }),
        );
    }

    Value::Object(body)
}

fn map_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}
