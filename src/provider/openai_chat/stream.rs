use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::Deserialize;

use crate::error::{ChatError, ProviderFault};
use crate::http::HttpBodyStream;
use crate::provider::FragmentStream;
use crate::stream::{StreamDecoder, StreamEvent};

pub(crate) fn create_stream(body: HttpBodyStream) -> FragmentStream {
    Box::pin(OpenAiFragmentStream {
        decoder: StreamDecoder::new(body, "openai_chat"),
    })
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiDelta>,
}

#[derive(Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

/// 将 Chat Completions 的 SSE 块还原为增量文本
struct OpenAiFragmentStream {
    decoder: StreamDecoder,
}

impl Stream for OpenAiFragmentStream {
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
    let chunk: OpenAiStreamChunk = serde_json::from_str(data).map_err(|err| {
        ChatError::provider(
            "openai_chat",
            ProviderFault::Upstream,
            format!("failed to parse stream chunk: {err}"),
            false,
        )
    })?;

    let mut fragment = String::new();
    for choice in &chunk.choices {
        if let Some(delta) = &choice.delta {
            if let Some(content) = &delta.content {
                fragment.push_str(content);
            }
        }
    }
    if fragment.is_empty() {
        Ok(None)
    } else {
        Ok(Some(fragment))
    }
}
