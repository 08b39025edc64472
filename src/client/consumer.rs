//! 网关 SSE 回放 把信封流折叠进占位消息

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::http::HttpBodyStream;
use crate::stream::{StreamDecoder, StreamEvent};
use crate::types::{EnvelopeKind, StreamEnvelope};

use super::store::ConversationStore;

/// Replays a gateway SSE body into the message identified by `message_id`.
///
/// Fragments accumulate locally and the stored message is overwritten with
/// the whole accumulated text after each one, so a reader never observes a
/// partial splice. Payloads that fail to decode as an envelope are logged
/// and skipped rather than aborting the stream. Error envelopes render as
/// ordinary text; the tag only changes how loudly they are logged.
///
/// Returns once the stream closes. A transport failure surfaces as `Err`
/// and leaves whatever content had accumulated in place.
pub async fn consume_stream(
    body: HttpBodyStream,
    store: Arc<Mutex<ConversationStore>>,
    message_id: &str,
) -> Result<(), ChatError> {
    let mut decoder = StreamDecoder::new(body, "kaiwa_gateway");
    let mut accumulated = String::new();

    while let Some(event) = decoder.next().await {
        match event? {
            StreamEvent::Data(payload) => {
                let envelope: StreamEnvelope = match serde_json::from_str(&payload) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        debug!(error = %err, "skipping undecodable stream payload");
                        continue;
                    }
                };
                if envelope.kind == EnvelopeKind::Error {
                    warn!(message_id = %message_id, detail = %envelope.content, "stream ended with an error envelope");
                }
                if envelope.content.is_empty() {
                    continue;
                }
                accumulated.push_str(&envelope.content);
                store
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .update_message(message_id, accumulated.clone());
            }
            StreamEvent::Done => break,
        }
    }
    Ok(())
}
