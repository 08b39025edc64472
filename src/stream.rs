use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::{ChatError, ProviderFault};
use crate::http::HttpBodyStream;

/// Standardized SSE event yielded by [`StreamDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Raw `data:` payload of one event.
    Data(String),
    /// Terminal marker reported via `[DONE]`.
    Done,
}

/// Incremental SSE framing: splits a raw byte stream into `data:` payloads.
///
/// Both sides of the gateway use this decoder. The provider adapters feed it
/// upstream bodies and translate each payload into a text fragment; the
/// native client feeds it the gateway's own response and translates each
/// payload into a [`crate::types::StreamEnvelope`]. Multi-line `data:` events
/// are joined with `\n`, comment and `event:` lines are ignored, and a
/// `[DONE]` marker terminates the stream for protocols that send one.
pub struct StreamDecoder {
    body: HttpBodyStream,
    buffer: Vec<u8>,
    data_lines: Vec<Vec<u8>>,
    pending: VecDeque<StreamEvent>,
    origin: &'static str,
    stream_closed: bool,
    done_received: bool,
}

impl StreamDecoder {
    /// Wraps a raw HTTP body stream and prepares it for SSE decoding.
    ///
    /// `origin` names the peer for error reporting, such as `openai_chat`.
    pub fn new(body: HttpBodyStream, origin: &'static str) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            data_lines: Vec::new(),
            pending: VecDeque::new(),
            origin,
            stream_closed: false,
            done_received: false,
        }
    }

    fn handle_line(&mut self, line: Vec<u8>) {
        if line.starts_with(b"data:") {
            let mut data = line[5..].to_vec();
            if let Some(first) = data.first() {
                if *first == b' ' {
                    data.remove(0);
                }
            }
            self.data_lines.push(data);
        }
    }

    fn flush_event(&mut self) -> Result<(), ChatError> {
        if self.data_lines.is_empty() {
            return Ok(());
        }

        let mut joined = Vec::new();
        for (idx, mut segment) in self.data_lines.drain(..).enumerate() {
            if idx > 0 {
                joined.push(b'\n');
            }
            joined.append(&mut segment);
        }

        if joined.is_empty() {
            return Ok(());
        }

        let data = String::from_utf8(joined).map_err(|err| {
            ChatError::provider(
                self.origin,
                ProviderFault::Upstream,
                format!("invalid UTF-8 in stream chunk: {err}"),
                false,
            )
        })?;

        if data.trim() == "[DONE]" {
            if !self.done_received {
                self.done_received = true;
                self.pending.push_back(StreamEvent::Done);
            }
        } else {
            self.pending.push_back(StreamEvent::Data(data));
        }

        Ok(())
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }
}

impl Stream for StreamDecoder {
    type Item = Result<StreamEvent, ChatError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(event) = this.pending.pop_front() {
            return Poll::Ready(Some(Ok(event)));
        }

        if this.done_received && this.pending.is_empty() {
            return Poll::Ready(None);
        }

        loop {
            if this.stream_closed {
                if !this.buffer.is_empty() {
                    let line = this.buffer.drain(..).collect::<Vec<u8>>();
                    this.handle_line(line);
                }
                if let Err(err) = this.flush_event() {
                    return Poll::Ready(Some(Err(err)));
                }
                return this
                    .pending
                    .pop_front()
                    .map_or(Poll::Ready(None), |event| Poll::Ready(Some(Ok(event))));
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(chunk_result)) => match chunk_result {
                    Ok(bytes) => {
                        this.buffer.extend_from_slice(&bytes);
                        while let Some(line) = Self::drain_line(&mut this.buffer) {
                            if line.is_empty() {
                                if let Err(err) = this.flush_event() {
                                    return Poll::Ready(Some(Err(err)));
                                }
                                if let Some(event) = this.pending.pop_front() {
                                    return Poll::Ready(Some(Ok(event)));
                                }
                            } else {
                                this.handle_line(line);
                            }
                        }
                        if let Some(event) = this.pending.pop_front() {
                            return Poll::Ready(Some(Ok(event)));
                        }
                    }
                    Err(err) => return Poll::Ready(Some(Err(err))),
                },
                Poll::Ready(None) => {
                    this.stream_closed = true;
                    continue;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
