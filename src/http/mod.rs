use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use serde::Serialize;

use crate::error::ChatError;

/// Enumerates HTTP methods understood by the lightweight transport abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Minimal HTTP request representation shared by the provider adapters and
/// the native client.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Builds a POST request with a JSON request body.
    ///
    /// The helper sets the `Content-Type` header to `application/json` and
    /// stores the provided buffer as the body.
    ///
    /// # Examples
    ///
    /// ```
    /// use kaiwa::http::{HttpMethod, HttpRequest};
    ///
    /// let request = HttpRequest::post_json("http://localhost:3000/chat", br"{}".to_vec());
    /// assert_eq!(request.method, HttpMethod::Post);
    /// assert_eq!(request.headers.get("Content-Type"), Some(&"application/json".to_string()));
    /// ```
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body: Some(body),
            timeout: None,
        }
    }

    /// Builds a PUT request with a JSON request body.
    pub fn put_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Put,
            ..Self::post_json(url, body)
        }
    }

    /// Builds a bodyless GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Overrides the request headers after construction.
    ///
    /// Adapters use this to stamp authorization and protocol headers before
    /// dispatching the request.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use kaiwa::http::HttpRequest;
    ///
    /// let request = HttpRequest::post_json("http://localhost:3000/chat", br"{}".to_vec())
    ///     .with_headers(HashMap::from([("x-api-key".into(), "test".into())]));
    /// assert_eq!(request.headers.get("x-api-key"), Some(&"test".to_string()));
    /// ```
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Minimal HTTP response representation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 2xx 状态判断
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts the body into a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Transport`] when the body cannot be interpreted
    /// as UTF-8.
    pub fn into_string(self) -> Result<String, ChatError> {
        String::from_utf8(self.body).map_err(|err| ChatError::transport(err.to_string()))
    }
}

/// HTTP response that carries a streaming body.
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: HttpBodyStream,
}

/// Alias for the body stream returned by [`HttpTransport::send_stream`].
pub type HttpBodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ChatError>> + Send>>;

/// Transport abstraction decoupling the crate from the concrete HTTP client.
///
/// Every network user in the crate (the three adapters, the save worker, the
/// native chat client) goes through this trait, so tests can substitute
/// scripted in-memory transports for the real thing.
///
/// # Examples
///
/// ```
/// # use async_trait::async_trait;
/// # use kaiwa::http::{HttpTransport, HttpRequest, HttpResponse, HttpStreamResponse};
/// # use kaiwa::error::ChatError;
/// # use futures_util::stream;
/// struct MemoryTransport;
///
/// #[async_trait]
/// impl HttpTransport for MemoryTransport {
///     async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ChatError> {
///         Ok(HttpResponse { status: 200, headers: request.headers, body: b"ok".to_vec() })
///     }
///     async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, ChatError> {
///         Ok(HttpStreamResponse { status: 200, headers: request.headers, body: Box::pin(stream::empty()) })
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let transport = MemoryTransport;
/// let response = transport
///     .send(HttpRequest::get("http://localhost:3000/chat/history"))
///     .await
///     .unwrap();
/// assert!(response.is_success());
/// # });
/// ```
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and resolves when the full response is available.
    ///
    /// # Errors
    ///
    /// Implementations should map network failures to
    /// [`ChatError::Transport`] and other issues to the appropriate
    /// [`ChatError`] variant.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ChatError>;

    /// Sends a request and returns a streaming body.
    ///
    /// # Errors
    ///
    /// Implementations should return [`ChatError::Transport`] for network
    /// failures or propagate provider-specific errors otherwise.
    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, ChatError>;
}

/// Thread-safe handle to a transport implementation.
pub type DynHttpTransport = Arc<dyn HttpTransport>;

/// Serializes a body to JSON, attaches headers, and issues a POST request.
///
/// # Errors
///
/// Returns [`ChatError::Validation`] if serialization fails or forwards the
/// error raised by [`HttpTransport::send`].
pub async fn post_json_with_headers<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
) -> Result<HttpResponse, ChatError> {
    let payload = serde_json::to_vec(body).map_err(|err| ChatError::Validation {
        message: format!("failed to serialize request: {err}"),
    })?;
    let request = HttpRequest::post_json(url, payload).with_headers(headers);
    transport.send(request).await
}

/// Issues a JSON POST request and returns the streaming response.
///
/// Mirrors [`post_json_with_headers`] but calls
/// [`HttpTransport::send_stream`] for Server-Sent Events and similar
/// protocols.
///
/// # Errors
///
/// Returns [`ChatError::Validation`] when serialization fails or propagates
/// any error from [`HttpTransport::send_stream`].
pub async fn post_json_stream_with_headers<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
) -> Result<HttpStreamResponse, ChatError> {
    let payload = serde_json::to_vec(body).map_err(|err| ChatError::Validation {
        message: format!("failed to serialize request: {err}"),
    })?;
    let request = HttpRequest::post_json(url, payload).with_headers(headers);
    transport.send_stream(request).await
}


pub mod reqwest;
