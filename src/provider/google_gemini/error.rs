use serde::Deserialize;

use crate::error::{ChatError, ProviderFault};

/// 解析 Google RPC 风格的错误响应 HTTP 状态与 status 字段联合分类
pub(crate) fn parse_gemini_error(status: u16, body: &str) -> ChatError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }

    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        status: Option<String>,
    }

    let (message, status_hint) = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: Some(error) }) => {
            let mut message = error.message.unwrap_or_else(|| "unknown error".to_string());
            if let Some(status_text) = error.status.as_deref() {
                if !status_text.is_empty() {
                    message = format!("{message} ({status_text})");
                }
            }
            (message, error.status)
        }
        _ => (format!("status {status}: {body}"), None),
    };
    let status_hint = status_hint.as_deref();

    let (kind, retryable) = if status == 429 || status_hint == Some("RESOURCE_EXHAUSTED") {
        (ProviderFault::RateLimit, true)
    } else if matches!(status, 401 | 403)
        || matches!(status_hint, Some("UNAUTHENTICATED" | "PERMISSION_DENIED"))
    {
        (ProviderFault::Auth, false)
    } else if status == 400 || status_hint == Some("INVALID_ARGUMENT") {
        (ProviderFault::InvalidRequest, false)
    } else if status >= 500 {
        (ProviderFault::Upstream, true)
    } else {
        (ProviderFault::Upstream, false)
    };
    ChatError::provider("google_gemini", kind, message, retryable)
}
