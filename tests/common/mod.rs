//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use kaiwa::error::ChatError;
use kaiwa::http::{HttpBodyStream, HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};

/// One scripted reply for a streaming call.
pub struct ScriptedStream {
    pub status: u16,
    pub chunks: Vec<Result<Vec<u8>, ChatError>>,
    /// Keeps the body open after the last chunk instead of closing it.
    pub hold_open: bool,
}

impl ScriptedStream {
    /// 200 response whose body replays `chunks` in order, then closes.
    pub fn ok(chunks: Vec<&str>) -> Self {
        Self {
            status: 200,
            chunks: chunks
                .into_iter()
                .map(|chunk| Ok(chunk.as_bytes().to_vec()))
                .collect(),
            hold_open: false,
        }
    }

    /// Non-2xx response carrying `body` whole.
    pub fn error(status: u16, body: &str) -> Self {
        Self {
            status,
            chunks: vec![Ok(body.as_bytes().to_vec())],
            hold_open: false,
        }
    }

    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

/// Transport that replays scripted responses and records every request it
/// saw, so tests can assert on the exact wire shape without a server.
#[derive(Default)]
pub struct ScriptedTransport {
    send_responses: Mutex<VecDeque<HttpResponse>>,
    stream_responses: Mutex<VecDeque<ScriptedStream>>,
    send_requests: Mutex<Vec<HttpRequest>>,
    stream_requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_send(&self, status: u16, body: &str) {
        self.send_responses.lock().unwrap().push_back(HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.as_bytes().to_vec(),
        });
    }

    pub fn push_stream(&self, scripted: ScriptedStream) {
        self.stream_responses.lock().unwrap().push_back(scripted);
    }

    pub fn send_requests(&self) -> Vec<HttpRequest> {
        self.send_requests.lock().unwrap().clone()
    }

    pub fn stream_requests(&self) -> Vec<HttpRequest> {
        self.stream_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ChatError> {
        self.send_requests.lock().unwrap().push(request);
        self.send_responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChatError::transport("no scripted send response left"))
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, ChatError> {
        self.stream_requests.lock().unwrap().push(request);
        let scripted = self
            .stream_responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChatError::transport("no scripted stream response left"))?;

        let replay = stream::iter(scripted.chunks);
        let body: HttpBodyStream = if scripted.hold_open {
            Box::pin(replay.chain(stream::pending()))
        } else {
            Box::pin(replay)
        };
        Ok(HttpStreamResponse {
            status: scripted.status,
            headers: HashMap::new(),
            body,
        })
    }
}

/// Decodes a recorded request body as JSON.
pub fn request_json(request: &HttpRequest) -> serde_json::Value {
    serde_json::from_slice(request.body.as_deref().unwrap_or_default())
        .expect("request body should be JSON")
}

/// Formats one SSE data event the way providers and the gateway emit them.
pub fn sse_event(payload: &str) -> String {
    format!("data: {payload}\n\n")
}
