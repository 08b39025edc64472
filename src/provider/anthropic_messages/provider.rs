use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ChatError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::provider::{FragmentStream, ProviderAdapter, collect_error_body};
use crate::types::PromptContext;

use super::error::parse_anthropic_error;
use super::request::build_anthropic_body;
use super::stream::create_stream;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_VERSION: &str = "2023-06-01";

/// Anthropic Messages 适配器
pub struct AnthropicMessagesAdapter {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) version: String,
}

impl AnthropicMessagesAdapter {
    /// 使用默认 base_url 与 anthropic-version 创建适配器
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            version: DEFAULT_VERSION.to_string(),
        }
    }

    /// 自定义 base_url 便于接入代理或兼容层
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 自定义 anthropic-version 头
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/messages")
        } else {
            format!("{base}/v1/messages")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), self.api_key.clone());
        headers.insert("anthropic-version".to_string(), self.version.clone());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "text/event-stream".to_string());
        headers
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicMessagesAdapter {
    fn translate(&self, context: &PromptContext) -> Result<HttpRequest, ChatError> {
        let body = build_anthropic_body(context);
        let payload = serde_json::to_vec(&body).map_err(|err| ChatError::Validation {
            message: format!("failed to serialize request: {err}"),
        })?;
        Ok(HttpRequest::post_json(self.endpoint(), payload).with_headers(self.build_headers()))
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<FragmentStream, ChatError> {
        let response = self.transport.send_stream(request).await?;
        if !(200..300).contains(&response.status) {
            let text = collect_error_body(response.body, self.name()).await?;
            return Err(parse_anthropic_error(response.status, &text));
        }
        Ok(create_stream(response.body))
    }

    fn name(&self) -> &'static str {
        "anthropic_messages"
    }
}
