use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// 供应商族 对应三个适配器实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAiChat,
    GoogleGemini,
    AnthropicMessages,
}

impl ProviderKind {
    /// 供应商的稳定短名
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAiChat => "openai_chat",
            ProviderKind::GoogleGemini => "google_gemini",
            ProviderKind::AnthropicMessages => "anthropic_messages",
        }
    }

    /// 凭证所在的环境变量名
    pub fn credential_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAiChat => "OPENAI_API_KEY",
            ProviderKind::GoogleGemini => "GOOGLE_API_KEY",
            ProviderKind::AnthropicMessages => "ANTHROPIC_API_KEY",
        }
    }

    fn base_url_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAiChat => "OPENAI_BASE_URL",
            ProviderKind::GoogleGemini => "GOOGLE_BASE_URL",
            ProviderKind::AnthropicMessages => "ANTHROPIC_BASE_URL",
        }
    }
}

/// 目录中的一个可用模型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// 对外与对供应商一致的模型标识
    pub id: &'static str,
    pub provider: ProviderKind,
    /// 输出预算 仅在供应商要求时随请求下发
    pub max_output_tokens: u32,
}

/// Catalog of models the gateway will dispatch. Requests naming anything
/// else are rejected before any adapter is constructed.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelSpec>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            models: vec![
                ModelSpec {
                    id: "gpt-4o",
                    provider: ProviderKind::OpenAiChat,
                    max_output_tokens: 4096,
                },
                ModelSpec {
                    id: "gemini-1.5-pro-002",
                    provider: ProviderKind::GoogleGemini,
                    max_output_tokens: 4096,
                },
                ModelSpec {
                    id: "claude-3-5-sonnet-20240620",
                    provider: ProviderKind::AnthropicMessages,
                    max_output_tokens: 4096,
                },
            ],
        }
    }
}

impl ModelCatalog {
    /// 按模型标识查找
    pub fn resolve(&self, model: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|spec| spec.id == model)
    }

    /// 目录中全部模型标识
    pub fn model_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.models.iter().map(|spec| spec.id)
    }
}

const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Runtime configuration, read once from the process environment.
///
/// Credentials are optional here: their absence is a startup-time-detectable
/// condition, but the gateway enforces it per request so that models whose
/// provider is configured keep working.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub bind: String,
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub google_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
}

impl GatewayConfig {
    /// 从进程环境读取配置 空白值视为缺失
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            bind: read("KAIWA_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            openai_api_key: read(ProviderKind::OpenAiChat.credential_env()),
            google_api_key: read(ProviderKind::GoogleGemini.credential_env()),
            anthropic_api_key: read(ProviderKind::AnthropicMessages.credential_env()),
            openai_base_url: read(ProviderKind::OpenAiChat.base_url_env()),
            google_base_url: read(ProviderKind::GoogleGemini.base_url_env()),
            anthropic_base_url: read(ProviderKind::AnthropicMessages.base_url_env()),
        }
    }

    /// Returns the credential for a provider family.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Configuration`] naming the missing environment
    /// variable when no credential is configured.
    pub fn credential(&self, kind: ProviderKind) -> Result<&str, ChatError> {
        let key = match kind {
            ProviderKind::OpenAiChat => self.openai_api_key.as_deref(),
            ProviderKind::GoogleGemini => self.google_api_key.as_deref(),
            ProviderKind::AnthropicMessages => self.anthropic_api_key.as_deref(),
        };
        key.ok_or_else(|| {
            ChatError::configuration(format!(
                "missing credential {} for provider {}",
                kind.credential_env(),
                kind.as_str()
            ))
        })
    }

    /// 供应商的 base_url 覆盖 未配置时适配器使用默认端点
    pub fn base_url(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::OpenAiChat => self.openai_base_url.as_deref(),
            ProviderKind::GoogleGemini => self.google_base_url.as_deref(),
            ProviderKind::AnthropicMessages => self.anthropic_base_url.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_catalog_covers_all_three_providers() {
        let catalog = ModelCatalog::default();
        assert_eq!(
            catalog.resolve("gpt-4o").map(|s| s.provider),
            Some(ProviderKind::OpenAiChat)
        );
        assert_eq!(
            catalog.resolve("gemini-1.5-pro-002").map(|s| s.provider),
            Some(ProviderKind::GoogleGemini)
        );
        assert_eq!(
            catalog
                .resolve("claude-3-5-sonnet-20240620")
                .map(|s| s.provider),
            Some(ProviderKind::AnthropicMessages)
        );
        assert!(catalog.resolve("unknown-model").is_none());
    }

    #[test]
    fn credential_lookup_reports_missing_env_var() {
        let config = GatewayConfig::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-test")]));
        assert_eq!(
            config.credential(ProviderKind::OpenAiChat).expect("key"),
            "sk-test"
        );

        let err = config
            .credential(ProviderKind::GoogleGemini)
            .expect_err("missing key");
        match err {
            ChatError::Configuration { message } => {
                assert!(message.contains("GOOGLE_API_KEY"), "{message}");
            }
            other => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "   "),
            ("KAIWA_BIND", ""),
        ]));
        assert!(config.anthropic_api_key.is_none());
        assert_eq!(config.bind, DEFAULT_BIND);
    }

    #[test]
    fn base_url_overrides_are_per_provider() {
        let config = GatewayConfig::from_lookup(lookup_from(&[(
            "OPENAI_BASE_URL",
            "http://localhost:8080",
        )]));
        assert_eq!(
            config.base_url(ProviderKind::OpenAiChat),
            Some("http://localhost:8080")
        );
        assert_eq!(config.base_url(ProviderKind::GoogleGemini), None);
    }
}
