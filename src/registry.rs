use std::sync::Arc;

use crate::config::{GatewayConfig, ModelCatalog, ModelSpec, ProviderKind};
use crate::error::ChatError;
use crate::http::DynHttpTransport;
use crate::provider::DynAdapter;
use crate::provider::anthropic_messages::AnthropicMessagesAdapter;
use crate::provider::google_gemini::GoogleGeminiAdapter;
use crate::provider::openai_chat::OpenAiChatAdapter;

/// 请求分发入口 按模型目录挑选供应商并构造适配器
pub struct AdapterRegistry {
    transport: DynHttpTransport,
    catalog: ModelCatalog,
    config: GatewayConfig,
}

impl AdapterRegistry {
    /// 组合传输层 模型目录与运行配置
    pub fn new(transport: DynHttpTransport, catalog: ModelCatalog, config: GatewayConfig) -> Self {
        Self {
            transport,
            catalog,
            config,
        }
    }

    /// Resolves a model identifier to a ready-to-use adapter.
    ///
    /// Adapters hold nothing but an `Arc` clone of the transport and their
    /// credential, so a fresh one is built per request rather than cached.
    /// Model resolution runs before the credential check, so an unknown
    /// model reports [`ChatError::UnsupportedModel`] even on a host with no
    /// credentials configured.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnsupportedModel`] for models outside the
    /// catalog and [`ChatError::Configuration`] when the provider's
    /// credential is missing.
    pub fn adapter_for(&self, model: &str) -> Result<(DynAdapter, ModelSpec), ChatError> {
        let spec = self
            .catalog
            .resolve(model)
            .ok_or_else(|| ChatError::UnsupportedModel {
                model: model.to_string(),
            })?
            .clone();
        let api_key = self.config.credential(spec.provider)?.to_string();
        let base_url = self.config.base_url(spec.provider);

        let adapter: DynAdapter = match spec.provider {
            ProviderKind::OpenAiChat => {
                let mut adapter = OpenAiChatAdapter::new(self.transport.clone(), api_key);
                if let Some(base) = base_url {
                    adapter = adapter.with_base_url(base);
                }
                Arc::new(adapter)
            }
            ProviderKind::GoogleGemini => {
                let mut adapter = GoogleGeminiAdapter::new(self.transport.clone(), api_key);
                if let Some(base) = base_url {
                    adapter = adapter.with_base_url(base);
                }
                Arc::new(adapter)
            }
            ProviderKind::AnthropicMessages => {
                let mut adapter = AnthropicMessagesAdapter::new(self.transport.clone(), api_key);
                if let Some(base) = base_url {
                    adapter = adapter.with_base_url(base);
                }
                Arc::new(adapter)
            }
        };
        Ok((adapter, spec))
    }

    /// 目录中全部可分发的模型标识
    pub fn models(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.catalog.model_ids()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::http::{HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};
    use crate::types::{ChatTurn, PromptContext, Role};

    /// 注册表测试不应触网 任何传输调用都视为测试失败
    struct PanicTransport;

    #[async_trait]
    impl HttpTransport for PanicTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, ChatError> {
            panic!("send should not be called");
        }

        async fn send_stream(&self, _request: HttpRequest) -> Result<HttpStreamResponse, ChatError> {
            panic!("send_stream should not be called");
        }
    }

    fn registry_with(config: GatewayConfig) -> AdapterRegistry {
        AdapterRegistry::new(Arc::new(PanicTransport), ModelCatalog::default(), config)
    }

    #[test]
    fn unknown_model_is_rejected_before_credentials() {
        let registry = registry_with(GatewayConfig::default());
        let err = match registry.adapter_for("gpt-5-nano") {
            Ok(_) => panic!("unknown model must be rejected"),
            Err(err) => err,
        };
        match err {
            ChatError::UnsupportedModel { model } => assert_eq!(model, "gpt-5-nano"),
            other => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        let registry = registry_with(GatewayConfig::default());
        let err = match registry.adapter_for("gpt-4o") {
            Ok(_) => panic!("missing credential must be rejected"),
            Err(err) => err,
        };
        match err {
            ChatError::Configuration { message } => {
                assert!(message.contains("OPENAI_API_KEY"), "{message}");
            }
            other => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn each_catalog_model_maps_to_its_adapter() {
        let config = GatewayConfig {
            openai_api_key: Some("sk-test".to_string()),
            google_api_key: Some("g-test".to_string()),
            anthropic_api_key: Some("a-test".to_string()),
            ..GatewayConfig::default()
        };
        let registry = registry_with(config);

        let (adapter, spec) = registry.adapter_for("gpt-4o").expect("adapter");
        assert_eq!(adapter.name(), "openai_chat");
        assert_eq!(spec.max_output_tokens, 4096);

        let (adapter, _) = registry.adapter_for("gemini-1.5-pro-002").expect("adapter");
        assert_eq!(adapter.name(), "google_gemini");

        let (adapter, _) = registry
            .adapter_for("claude-3-5-sonnet-20240620")
            .expect("adapter");
        assert_eq!(adapter.name(), "anthropic_messages");
    }

    #[test]
    fn base_url_override_reaches_the_adapter() {
        let config = GatewayConfig {
            openai_api_key: Some("sk-test".to_string()),
            openai_base_url: Some("http://localhost:8080/v1".to_string()),
            ..GatewayConfig::default()
        };
        let registry = registry_with(config);
        let (adapter, spec) = registry.adapter_for("gpt-4o").expect("adapter");

        let context = PromptContext::new(
            "instruction",
            vec![ChatTurn::text(Role::User, "hi")],
            spec.id,
            Some(spec.max_output_tokens),
        )
        .expect("context");
        let request = adapter.translate(&context).expect("request");
        assert_eq!(request.url, "http://localhost:8080/v1/chat/completions");
    }
}
