use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ChatError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::provider::{FragmentStream, ProviderAdapter, collect_error_body};
use crate::types::PromptContext;

use super::error::parse_gemini_error;
use super::request::build_gemini_body;
use super::stream::create_stream;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini streamGenerateContent 适配器
pub struct GoogleGeminiAdapter {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl GoogleGeminiAdapter {
    /// 创建指向官方 Generative Language 端点的适配器
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// 自定义 base_url 便于接入代理或兼容层
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 流式端点 模型名走路径参数 alt=sse 选择 SSE 传输
    pub(crate) fn endpoint(&self, model: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let model_path = normalize_model(model);
        if base.ends_with("/v1beta") {
            format!("{base}/{model_path}:streamGenerateContent?alt=sse")
        } else {
            format!("{base}/v1beta/{model_path}:streamGenerateContent?alt=sse")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("x-goog-api-key".to_string(), self.api_key.clone());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "text/event-stream".to_string());
        headers
    }
}

fn normalize_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[async_trait]
impl ProviderAdapter for GoogleGeminiAdapter {
    fn translate(&self, context: &PromptContext) -> Result<HttpRequest, ChatError> {
        let body = build_gemini_body(context);
        let payload = serde_json::to_vec(&body).map_err(|err| ChatError::Validation {
            message: format!("failed to serialize request: {err}"),
        })?;
        Ok(
            HttpRequest::post_json(self.endpoint(&context.model), payload)
                .with_headers(self.build_headers()),
        )
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<FragmentStream, ChatError> {
        let response = self.transport.send_stream(request).await?;
        if !(200..300).contains(&response.status) {
            let text = collect_error_body(response.body, self.name()).await?;
            return Err(parse_gemini_error(response.status, &text));
        }
        Ok(create_stream(response.body))
    }

    fn name(&self) -> &'static str {
        "google_gemini"
    }
}
