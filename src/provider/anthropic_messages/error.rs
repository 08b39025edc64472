use serde::Deserialize;

use crate::error::{ChatError, ProviderFault};

/// 按 Anthropic 错误类型分类 同一映射供 HTTP 错误与流内错误事件使用
pub(crate) fn fault_for_error_type(kind: Option<&str>) -> (ProviderFault, bool) {
    match kind {
        Some("authentication_error") | Some("permission_error") => (ProviderFault::Auth, false),
        Some("rate_limit_error") => (ProviderFault::RateLimit, true),
        Some("invalid_request_error") | Some("not_found_error") => {
            (ProviderFault::InvalidRequest, false)
        }
        Some("overloaded_error") | Some("api_error") => (ProviderFault::Upstream, true),
        _ => (ProviderFault::Upstream, false),
    }
}

/// 解析非 2xx 响应 错误类型优先于 HTTP 状态码
pub(crate) fn parse_anthropic_error(status: u16, body: &str) -> ChatError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }

    #[derive(Deserialize)]
    struct InnerError {
        #[serde(rename = "type")]
        kind: Option<String>,
        message: Option<String>,
    }

    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        let message = error.message.unwrap_or_else(|| "unknown error".to_string());
        let (fault, retryable) = match error.kind.as_deref() {
            known @ Some(_) => fault_for_error_type(known),
            None => fault_for_status(status),
        };
        return ChatError::provider("anthropic_messages", fault, message, retryable);
    }

    let (fault, retryable) = fault_for_status(status);
    ChatError::provider(
        "anthropic_messages",
        fault,
        format!("status {status}: {body}"),
        retryable,
    )
}

fn fault_for_status(status: u16) -> (ProviderFault, bool) {
    match status {
        401 | 403 => (ProviderFault::Auth, false),
        429 => (ProviderFault::RateLimit, true),
        400 | 404 => (ProviderFault::InvalidRequest, false),
        status if status >= 500 => (ProviderFault::Upstream, true),
        _ => (ProviderFault::Upstream, false),
    }
}
