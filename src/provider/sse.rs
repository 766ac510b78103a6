//! Server-sent-event plumbing shared by the streaming providers.
//!
//! Turns a raw response body into a stream of `data:` payload strings.
//! Framing is byte-based: chunks are accumulated in a raw buffer and decoded
//! only once a full line is present, so a multi-byte UTF-8 character split
//! across two network chunks survives intact. `[DONE]` sentinels and
//! non-data lines are dropped here so family parsers only ever see payloads.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::BytesMut;
use futures_util::{stream, Stream, StreamExt};

use crate::error::RelayError;

fn data_payload(line: &str) -> Option<String> {
    let line = line.trim_end_matches('\r');
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload.to_string())
}

/// Splits an incoming byte stream into `data:` payloads. Incomplete trailing
/// bytes (including partial UTF-8 sequences) stay buffered until the next
/// chunk or `finish`.
#[derive(Default)]
struct PayloadBuffer {
    buffer: BytesMut,
}

impl PayloadBuffer {
    /// Absorb one body chunk; returns the payloads of every line it
    /// completed.
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            let text = String::from_utf8_lossy(&line[..pos]);
            if let Some(payload) = data_payload(&text) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush the remainder at end of stream; a final line without a trailing
    /// newline still counts.
    fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let leftover = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        data_payload(&leftover)
    }
}

struct LineState {
    body: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    codec: PayloadBuffer,
    pending: VecDeque<String>,
    exhausted: bool,
}

/// Stream of `data:` payloads from an SSE response. Transport errors while
/// reading the body surface as `Err` items.
pub(crate) fn data_lines(
    response: reqwest::Response,
) -> impl Stream<Item = Result<String, RelayError>> + Send {
    let state = LineState {
        body: Box::pin(response.bytes_stream()),
        codec: PayloadBuffer::default(),
        pending: VecDeque::new(),
        exhausted: false,
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.pending.pop_front() {
                return Some((Ok(payload), st));
            }
            if st.exhausted {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    st.pending.extend(st.codec.push(&chunk));
                }
                Some(Err(e)) => {
                    st.exhausted = true;
                    return Some((Err(RelayError::from(e)), st));
                }
                None => {
                    st.exhausted = true;
                    st.pending.extend(st.codec.finish());
                }
            }
        }
    })
}
