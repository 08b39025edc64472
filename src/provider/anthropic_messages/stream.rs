use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::Deserialize;

use crate::error::{ChatError, ProviderFault};
use crate::http::HttpBodyStream;
use crate::provider::FragmentStream;
use crate::stream::{StreamDecoder, StreamEvent};

use super::error::fault_for_error_type;

pub(crate) fn create_stream(body: HttpBodyStream) -> FragmentStream {
    Box::pin(AnthropicFragmentStream {
        decoder: StreamDecoder::new(body, "anthropic_messages"),
        stopped: false,
    })
}

#[derive(Deserialize)]
struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<AnthropicDelta>,
    error: Option<AnthropicStreamError>,
}

#[derive(Deserialize)]
struct AnthropicDelta {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicStreamError {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

enum ParsedEvent {
    Fragment(String),
    Stop,
    Ignored,
}

/// 将 Messages API 的类型化 SSE 事件还原为增量文本
///
/// content_block_delta 携带正文, message_stop 收尾, 错误以 type=error
/// 的事件内联送达, ping 与结构性事件直接跳过。
struct AnthropicFragmentStream {
    decoder: StreamDecoder,
    stopped: bool,
}

impl Stream for AnthropicFragmentStream {
    type Item = Result<String, ChatError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.stopped {
            return Poll::Ready(None);
        }
        loop {
            match Pin::new(&mut this.decoder).poll_next(cx) {
                Poll::Ready(Some(Ok(StreamEvent::Data(data)))) => match parse_event(&data) {
                    Ok(ParsedEvent::Fragment(fragment)) => {
                        return Poll::Ready(Some(Ok(fragment)));
                    }
                    Ok(ParsedEvent::Stop) => {
                        this.stopped = true;
                        return Poll::Ready(None);
                    }
                    Ok(ParsedEvent::Ignored) => continue,
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

fn parse_event(data: &str) -> Result<ParsedEvent, ChatError> {
    let event: AnthropicStreamEvent = serde_json::from_str(data).map_err(|err| {
        ChatError::provider(
            "anthropic_messages",
            ProviderFault::Upstream,
            format!("failed to parse stream event: {err}"),
            false,
        )
    })?;

    match event.kind.as_str() {
        "content_block_delta" => {
            let fragment = event
                .delta
                .filter(|delta| delta.kind.as_deref() == Some("text_delta"))
                .and_then(|delta| delta.text);
            match fragment {
                Some(text) if !text.is_empty() => Ok(ParsedEvent::Fragment(text)),
                _ => Ok(ParsedEvent::Ignored),
            }
        }
        "message_stop" => Ok(ParsedEvent::Stop),
        "error" => {
            let (kind, message) = event
                .error
                .map(|error| (error.kind, error.message))
                .unwrap_or((None, None));
            let (fault, retryable) = fault_for_error_type(kind.as_deref());
            Err(ChatError::provider(
                "anthropic_messages",
                fault,
                message.unwrap_or_else(|| "unknown stream error".to_string()),
                retryable,
            ))
        }
        _ => Ok(ParsedEvent::Ignored),
    }
}
