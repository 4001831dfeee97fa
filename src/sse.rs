//! SSE (Server-Sent Events) framing and body transformation
//!
//! Upstream providers send partial chunks that split JSON records across network packets, and
//! can split a multi-byte character the same way. [`SseEventStream`] accumulates bytes until a
//! complete event (terminated by a blank line) is available and only then decodes it, so
//! transforms always see whole records and whole characters.

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::trace;

/// A per-response text transform over an SSE stream.
///
/// One instance is created per response body and owns all of that stream's state.
pub trait SseTransform: Send + 'static {
    /// Consume one chunk of SSE text and return whatever should be sent downstream.
    fn push(&mut self, text: &str) -> String;

    /// Called once after the upstream stream ends; returns any trailing output.
    fn finish(&mut self) -> String;
}

/// A stream wrapper that yields complete SSE events as text.
///
/// Events are delimited by a blank line. Whatever is left when the inner stream ends is yielded
/// as a final, possibly incomplete, event.
pub struct SseEventStream<S> {
    inner: S,
    buffer: BytesMut,
}

impl<S> SseEventStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
        }
    }
}

impl<S, E> Stream for SseEventStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(end) = find_event_end(&this.buffer) {
                let complete = this.buffer.split_to(end);
                return Poll::Ready(Some(Ok(decode(&complete))));
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    if this.buffer.is_empty() {
                        return Poll::Ready(None);
                    }
                    let remaining = this.buffer.split();
                    return Poll::Ready(Some(Ok(decode(&remaining))));
                }
                Poll::Pending => {
                    return Poll::Pending;
                }
            }
        }
    }
}

/// Byte offset just past the blank line that ends the first complete event in `buf`.
///
/// Lines may end in `\n`, `\r\n` or `\r`, so `\n\n`, `\r\n\r\n` and `\r\r` all end an event.
/// A trailing `\r` could be the first half of `\r\n`, so it waits for the next byte.
pub fn find_event_end(buf: &[u8]) -> Option<usize> {
    let mut after_line_end = false;
    let mut i = 0;
    while i < buf.len() {
        let len = match buf[i] {
            b'\n' => 1,
            b'\r' => match buf.get(i + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                None => return None,
            },
            _ => {
                after_line_end = false;
                i += 1;
                continue;
            }
        };
        if after_line_end {
            return Some(i + len);
        }
        after_line_end = true;
        i += len;
    }
    None
}

/// Split every complete event off the front of `buffer`.
pub fn drain_events(buffer: &mut String) -> Vec<String> {
    let mut events = Vec::new();
    while let Some(end) = find_event_end(buffer.as_bytes()) {
        events.push(buffer.drain(..end).collect());
    }
    events
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Run `transform` over an SSE response body.
///
/// Transport errors are forwarded as-is and end the stream without calling
/// [`SseTransform::finish`].
pub fn transform_body<T: SseTransform>(body: Body, mut transform: T) -> Body {
    let mut events = SseEventStream::new(Box::pin(body.into_data_stream()));

    let stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            match event {
                Ok(text) => {
                    let out = transform.push(&text);
                    if !out.is_empty() {
                        yield Ok(Bytes::from(out));
                    }
                }
                Err(e) => {
                    trace!(error = %e, "Upstream stream failed mid-response");
                    yield Err(e);
                    return;
                }
            }
        }

        let tail = transform.finish();
        if !tail.is_empty() {
            yield Ok::<_, axum::Error>(Bytes::from(tail));
        }
    };

    Body::from_stream(stream)
}
