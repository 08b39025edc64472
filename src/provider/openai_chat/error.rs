use serde::Deserialize;
use serde_json::Value;

use crate::error::{ChatError, ProviderFault};

/// 将非 2xx 响应映射为 [`ChatError::Provider`]
pub(crate) fn parse_openai_error(status: u16, body: &str) -> ChatError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }
    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        code: Option<Value>,
    }

    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: Some(error) }) => {
            let mut message = error.message.unwrap_or_else(|| "unknown error".to_string());
            if let Some(code) = error.code {
                message = format!("{message} ({code})");
            }
            message
        }
        _ => format!("status {status}: {body}"),
    };

    let (kind, retryable) = match status {
        401 | 403 => (ProviderFault::Auth, false),
        429 => (ProviderFault::RateLimit, true),
        400 => (ProviderFault::InvalidRequest, false),
        status if status >= 500 => (ProviderFault::Upstream, true),
        _ => (ProviderFault::Upstream, false),
    };
    ChatError::provider("openai_chat", kind, message, retryable)
}
