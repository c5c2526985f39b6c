/// SSE `data:` line decoder and byte-stream adapter.
///
/// Recovers whole newline-terminated `data: ` lines from arbitrarily chunked
/// network reads. Only the `data: ` field is surfaced; comments, keep-alives,
/// `event:`/`id:` lines and blank lines are dropped.
use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use memchr::memchr_iter;

const DATA_PREFIX: &str = "data: ";

// ---------------------------------------------------------------------------
// Utf8ChunkDecoder: streaming UTF-8 decode across chunk boundaries
// ---------------------------------------------------------------------------

/// Decodes byte chunks as UTF-8, holding back an incomplete trailing
/// sequence until the next chunk completes it. Invalid sequences become
/// U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    remainder: Vec<u8>,
}

impl Utf8ChunkDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the decoded text of `bytes` to `out`.
    pub fn decode_into(&mut self, bytes: &[u8], out: &mut String) {
        if self.remainder.is_empty() {
            let tail = Self::decode_prefix(bytes, out);
            self.remainder.extend_from_slice(tail);
        } else {
            let mut joined = std::mem::take(&mut self.remainder);
            joined.extend_from_slice(bytes);
            let tail = Self::decode_prefix(&joined, out);
            self.remainder = tail.to_vec();
        }
    }

    /// Bytes held back waiting for the rest of a multi-byte sequence.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.remainder.len()
    }

    fn decode_prefix<'a>(mut bytes: &'a [u8], out: &mut String) -> &'a [u8] {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    out.push_str(text);
                    return &[];
                }
                Err(err) => {
                    let (valid, rest) = bytes.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match err.error_len() {
                        Some(invalid_len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[invalid_len..];
                        }
                        None => return rest,
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SseLineDecoder: incremental `data:` line splitter
// ---------------------------------------------------------------------------

/// Incremental SSE line decoder.
///
/// Keeps one text buffer. Each feed appends text, cuts every complete line
/// off the front and keeps the unterminated tail for the next feed. A
/// trailing tail is never a frame, even at end of input.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: String,
    read_offset: usize,
}

impl SseLineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed text and return the payloads of every complete `data: ` line.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed text and append complete payloads into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<String>) {
        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        for rel_pos in memchr_iter(b'\n', &self.buffer.as_bytes()[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let line = &self.buffer[processed_up_to..line_end];
            if let Some(payload) = data_payload(line) {
                out.push(payload.to_owned());
            }
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Text received after the last newline.
    #[must_use]
    pub fn unterminated(&self) -> &str {
        &self.buffer[self.read_offset..]
    }
}

/// Payload of a `data: ` line, or `None` for any other line.
#[must_use]
pub fn data_payload(line: &str) -> Option<&str> {
    if line.trim().is_empty() {
        return None;
    }
    let payload = line.strip_prefix(DATA_PREFIX)?;
    Some(payload.strip_suffix('\r').unwrap_or(payload))
}

// ---------------------------------------------------------------------------
// Stream utility
// ---------------------------------------------------------------------------

struct DataStreamState<S> {
    source: Option<std::pin::Pin<Box<S>>>,
    utf8: Utf8ChunkDecoder,
    lines: SseLineDecoder,
    text: String,
    parsed: Vec<String>,
    pending: VecDeque<String>,
}

/// Turn an HTTP body byte stream into a lazy stream of `data:` payloads.
///
/// A read error is yielded once and ends the stream. The byte source is
/// dropped as soon as it ends or fails, releasing the underlying connection
/// even if the consumer keeps the returned stream alive.
pub fn sse_data_stream<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    let state = DataStreamState {
        source: Some(Box::pin(byte_stream)),
        utf8: Utf8ChunkDecoder::new(),
        lines: SseLineDecoder::new(),
        text: String::new(),
        parsed: Vec::with_capacity(8),
        pending: VecDeque::with_capacity(8),
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(payload) = state.pending.pop_front() {
                return Some((Ok(payload), state));
            }

            let source = state.source.as_mut()?;
            match source.next().await {
                Some(Ok(bytes)) => {
                    state.text.clear();
                    state.utf8.decode_into(&bytes, &mut state.text);
                    state.lines.feed_into(&state.text, &mut state.parsed);
                    state.pending.extend(state.parsed.drain(..));
                }
                Some(Err(err)) => {
                    state.source = None;
                    return Some((Err(err), state));
                }
                None => {
                    state.source = None;
                    let leftover = state.lines.unterminated();
                    if !leftover.trim().is_empty() {
                        tracing::debug!(
                            bytes = leftover.len(),
                            "discarding unterminated SSE line at end of stream"
                        );
                    }
                    return None;
                }
            }
        }
    })
}
