//! 各上游供应商的适配器实现。

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;

use crate::error::ChatError;
use crate::http::{HttpBodyStream, HttpRequest};
use crate::types::PromptContext;

pub mod anthropic_messages;
pub mod google_gemini;
pub mod openai_chat;

/// Stream of plain text fragments produced by a provider adapter.
///
/// Every adapter normalizes its wire protocol down to this shape, so the
/// gateway can treat all upstreams identically once a stream is open.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Shared-ownership handle to any provider adapter.
pub type DynAdapter = Arc<dyn ProviderAdapter>;

/// Uniform surface every upstream adapter implements.
///
/// An adapter owns two concerns and nothing else: translating a neutral
/// [`PromptContext`] into its provider's request shape, and decoding the
/// provider's streaming response into text fragments. Callers go through
/// [`ProviderAdapter::stream_reply`] and never see provider wire formats.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// 将中立请求组装为该供应商的 HTTP 请求。
    fn translate(&self, context: &PromptContext) -> Result<HttpRequest, ChatError>;

    /// 发送请求并把响应解码为文本片段流。
    async fn open_stream(&self, request: HttpRequest) -> Result<FragmentStream, ChatError>;

    /// Stable provider name used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Translates the context and opens the reply stream in one step.
    async fn stream_reply(&self, context: &PromptContext) -> Result<FragmentStream, ChatError> {
        let request = self.translate(context)?;
        self.open_stream(request).await
    }
}

/// 读取错误响应体并还原为字符串, 供各适配器解析错误详情。
pub(crate) async fn collect_error_body(
    mut body: HttpBodyStream,
    provider: &'static str,
) -> Result<String, ChatError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    String::from_utf8(bytes).map_err(|err| {
        ChatError::transport(format!("{provider} error body is not UTF-8: {err}"))
    })
}
