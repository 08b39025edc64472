use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ChatError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::provider::{FragmentStream, ProviderAdapter, collect_error_body};
use crate::types::PromptContext;

use super::error::parse_openai_error;
use super::request::build_openai_body;
use super::stream::create_stream;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI Chat Completions 适配器
pub struct OpenAiChatAdapter {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl OpenAiChatAdapter {
    /// 创建带默认 base_url 的适配器
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// 自定义 base_url 兼容 OpenAI 协议的代理端点
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "text/event-stream".to_string());
        headers
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiChatAdapter {
    fn translate(&self, context: &PromptContext) -> Result<HttpRequest, ChatError> {
        let body = build_openai_body(context);
        let payload = serde_json::to_vec(&body).map_err(|err| ChatError::Validation {
            message: format!("failed to serialize request: {err}"),
        })?;
        Ok(HttpRequest::post_json(self.endpoint(), payload).with_headers(self.build_headers()))
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<FragmentStream, ChatError> {
        let response = self.transport.send_stream(request).await?;
        if !(200..300).contains(&response.status) {
            let text = collect_error_body(response.body, self.name()).await?;
            return Err(parse_openai_error(response.status, &text));
        }
        Ok(create_stream(response.body))
    }

    fn name(&self) -> &'static str {
        "openai_chat"
    }
}
