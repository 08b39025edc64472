//! Folds adapter fragment streams into the outbound envelope protocol.

use std::convert::Infallible;

use async_stream::stream;
use axum::response::sse::Event;
use futures_core::Stream;
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::provider::FragmentStream;
use crate::types::StreamEnvelope;

/// 流中途失败时折叠进信封的提示文本
pub(crate) const STREAM_FAILURE_TEXT: &str = "Error: failed to generate response";

/// Wraps provider fragments into SSE envelope events.
///
/// Empty fragments are dropped. The first fragment error ends the stream
/// after exactly one tagged error envelope; the connection then closes
/// normally, so consumers keep treating closure as the end signal.
pub fn envelope_stream(
    mut fragments: FragmentStream,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream! {
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    if let Some(event) = envelope_event(&StreamEnvelope::content(fragment)) {
                        yield Ok(event);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "provider stream failed mid-flight");
                    if let Some(event) = envelope_event(&StreamEnvelope::error(STREAM_FAILURE_TEXT)) {
                        yield Ok(event);
                    }
                    break;
                }
            }
        }
    }
}

fn envelope_event(envelope: &StreamEnvelope) -> Option<Event> {
    match serde_json::to_string(envelope) {
        Ok(json) => Some(Event::default().data(json)),
        Err(err) => {
            debug!(error = %err, "failed to serialize stream envelope");
            None
        }
    }
}
