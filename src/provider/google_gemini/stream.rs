use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::Deserialize;

use crate::error::{ChatError, ProviderFault};
use crate::http::HttpBodyStream;
use crate::provider::FragmentStream;
use crate::stream::{StreamDecoder, StreamEvent};

pub(crate) fn create_stream(body: HttpBodyStream) -> FragmentStream {
    Box::pin(GeminiFragmentStream {
        decoder: StreamDecoder::new(body, "google_gemini"),
    })
}

#[derive(Deserialize)]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

/// 将 Gemini 的 SSE 块还原为增量文本 该协议不发送 [DONE] 以连接关闭收尾
struct GeminiFragmentStream {
    decoder: StreamDecoder,
}

impl Stream for GeminiFragmentStream {
    type Item = Result<String, ChatError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.decoder).poll_next(cx) {
                Poll::Ready(Some(Ok(StreamEvent::Data(data)))) => match parse_chunk(&data) {
                    Ok(Some(fragment)) => return Poll::Ready(Some(Ok(fragment))),
                    Ok(None) => continue,
                    Err(err) => return Poll::Ready(Some(Err(err))),
                },
                Poll::Ready(Some(Ok(StreamEvent::Done))) => return Poll::Ready(None),
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

fn parse_chunk(data: &str) -> Result<Option<String>, ChatError> {
    let chunk: GeminiStreamChunk = serde_json::from_str(data).map_err(|err| {
        ChatError::provider(
            "google_gemini",
            ProviderFault::Upstream,
            format!("failed to parse stream chunk: {err}"),
            false,
        )
    })?;

    let mut fragment = String::new();
    for candidate in &chunk.candidates {
        if let Some(content) = &candidate.content {
            for part in &content.parts {
                if let Some(text) = &part.text {
                    fragment.push_str(text);
                }
            }
        }
    }
    if fragment.is_empty() {
        Ok(None)
    } else {
        Ok(Some(fragment))
    }
}
