use thiserror::Error;

/// Aggregates every failure mode exposed by the chat gateway and its clients.
///
/// The gateway maps variants to HTTP statuses before the response stream is
/// committed; once streaming has begun, errors are folded into the outbound
/// stream instead and this type only shows up in logs.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Signals validation failures in the inbound request payload.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Reports missing or unusable deployment configuration, such as an
    /// absent provider credential.
    #[error("configuration error: {message}")]
    Configuration { message: String },
    /// Indicates that the requested model matches no known adapter.
    #[error("unsupported model: {model}")]
    UnsupportedModel { model: String },
    /// Wraps a fault reported by an upstream provider.
    #[error("provider {provider} {}: {message}", .kind.as_str())]
    Provider {
        /// Name of the adapter, such as `openai_chat`.
        provider: &'static str,
        /// Coarse classification of the fault.
        kind: ProviderFault,
        /// Human-readable message, kept verbatim for debugging.
        message: String,
        /// Whether replaying the same request later could succeed.
        retryable: bool,
    },
    /// Represents transport-layer or networking failures.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Signals that a streaming channel closed before the response completed.
    #[error("stream closed unexpectedly: {message}")]
    StreamClosed { message: String },
}

/// Coarse classification of provider-reported faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFault {
    /// Credential rejected by the provider.
    Auth,
    /// Provider throttled the request.
    RateLimit,
    /// Provider rejected the translated request as malformed.
    InvalidRequest,
    /// Any other upstream failure.
    Upstream,
}

impl ProviderFault {
    /// 错误类别的稳定短名 用于日志与 Display
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFault::Auth => "auth failure",
            ProviderFault::RateLimit => "rate limited",
            ProviderFault::InvalidRequest => "rejected request",
            ProviderFault::Upstream => "upstream error",
        }
    }
}

impl ChatError {
    /// Creates a [`ChatError::Validation`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use kaiwa::error::ChatError;
    ///
    /// let err = ChatError::validation("messages must not be empty");
    /// assert!(matches!(err, ChatError::Validation { .. }));
    /// ```
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a [`ChatError::Configuration`] from a textual description.
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a [`ChatError::Transport`] from a textual description.
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a [`ChatError::Provider`] with the given classification.
    ///
    /// # Examples
    ///
    /// ```
    /// use kaiwa::error::{ChatError, ProviderFault};
    ///
    /// let err = ChatError::provider("openai_chat", ProviderFault::RateLimit, "slow down", true);
    /// assert!(err.is_rate_limit());
    /// ```
    pub fn provider<T: Into<String>>(
        provider: &'static str,
        kind: ProviderFault,
        message: T,
        retryable: bool,
    ) -> Self {
        Self::Provider {
            provider,
            kind,
            message: message.into(),
            retryable,
        }
    }

    /// Returns `true` when this error is a provider rate limit.
    ///
    /// The gateway uses this to decide between a 429 response (detected before
    /// the stream opened) and an in-stream error envelope (detected after).
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            ChatError::Provider {
                kind: ProviderFault::RateLimit,
                ..
            }
        )
    }

    /// Returns `true` when replaying the request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Provider { retryable, .. } => *retryable,
            ChatError::Transport { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_classification() {
        let err = ChatError::provider("google_gemini", ProviderFault::RateLimit, "quota", true);
        assert!(err.is_rate_limit());
        assert!(err.is_retryable());

        let err = ChatError::provider("google_gemini", ProviderFault::Auth, "bad key", false);
        assert!(!err.is_rate_limit());
        assert!(!err.is_retryable());
    }

    #[test]
    fn display_includes_provider_and_kind() {
        let err = ChatError::provider(
            "anthropic_messages",
            ProviderFault::Upstream,
            "overloaded",
            true,
        );
        let rendered = err.to_string();
        assert!(rendered.contains("anthropic_messages"), "{rendered}");
        assert!(rendered.contains("upstream error"), "{rendered}");
    }
}
