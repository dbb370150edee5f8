use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;

/// Reassembles raw byte chunks into complete SSE data lines.
///
/// Wraps an inner byte stream and yields complete `data: ` payloads
/// (with the `data: ` prefix stripped) one line at a time.
pub struct SseLineParser<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
}

impl<S> SseLineParser<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Box::pin(inner),
            buffer: Vec::new(),
        }
    }
}

impl<S, E> Stream for SseLineParser<S>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    type Item = Result<String, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(line) = take_next_data_line(&mut this.buffer) {
                return Poll::Ready(Some(Ok(line)));
            }

            match this.inner.as_mut().poll_next(cx) {
                // Bytes are decoded per line, so a character split across
                // chunks is rejoined before decoding.
                Poll::Ready(Some(Ok(bytes))) => this.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    // Stream ended without a trailing newline.
                    if !this.buffer.is_empty() {
                        this.buffer.push(b'\n');
                        if let Some(line) = take_next_data_line(&mut this.buffer) {
                            return Poll::Ready(Some(Ok(line)));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Scans the buffer for the next complete `data:` line and consumes every
/// line up to and including it. Blank lines, comments (`:`) and other SSE
/// fields (`event:`, `id:`, `retry:`) are skipped.
fn take_next_data_line(buffer: &mut Vec<u8>) -> Option<String> {
    loop {
        let newline_pos = buffer.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = buffer.drain(..=newline_pos).collect();
        let decoded = String::from_utf8_lossy(&raw[..newline_pos]);
        let line = decoded.trim_end_matches('\r');

        if let Some(payload) = line.strip_prefix("data:") {
            return Some(payload.strip_prefix(' ').unwrap_or(payload).to_owned());
        }
    }
}
