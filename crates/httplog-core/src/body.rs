//! Body helpers for adapters
//!
//! [`CapturedBody`] tees a streaming body into a bounded buffer while it is
//! forwarded to its consumer, then reports the captured bytes exactly once:
//! at end of stream, on a stream error, or when the body is dropped early.

use crate::error::BoxError;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use http_body::{Body, Frame, SizeHint};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, BodyStream, Empty, Full, StreamBody};
use pin_project_lite::pin_project;
use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Type-erased body used for buffered requests
pub type BoxBody = UnsyncBoxBody<Bytes, BoxError>;

/// A body holding the given bytes
pub fn full(bytes: impl Into<Bytes>) -> BoxBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// A body with no data
pub fn empty() -> BoxBody {
    Empty::new().map_err(|never| match never {}).boxed_unsync()
}

/// A body whose first poll fails with `error`
pub fn failed(error: impl Into<BoxError>) -> BoxBody {
    let error = error.into();
    StreamBody::new(stream::once(async move {
        Err::<Frame<Bytes>, BoxError>(error)
    }))
    .boxed_unsync()
}

/// Erase the type of any body with `Bytes` data
pub fn boxed<B>(body: B) -> BoxBody
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

/// Appended to logged bodies that were cut at the capture limit
pub const TRUNCATION_MARKER: &str = "...";

/// `body` followed by [`TRUNCATION_MARKER`] when `truncated` is set
pub fn mark_truncated(body: Bytes, truncated: bool) -> Bytes {
    if !truncated {
        return body;
    }
    let mut marked = BytesMut::with_capacity(body.len() + TRUNCATION_MARKER.len());
    marked.extend_from_slice(&body);
    marked.extend_from_slice(TRUNCATION_MARKER.as_bytes());
    marked.freeze()
}

/// A request body read ahead for logging
pub struct Buffered {
    /// At most `limit` bytes of the body
    pub logged: Bytes,
    /// Whether the body continues past `logged`
    pub truncated: bool,
    /// The complete body for the wrapped service
    pub forwarded: BoxBody,
}

impl Buffered {
    /// The bytes to log, marked when truncated
    pub fn logged_body(&self) -> Bytes {
        mark_truncated(self.logged.clone(), self.truncated)
    }
}

impl fmt::Debug for Buffered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffered")
            .field("logged", &self.logged.len())
            .field("truncated", &self.truncated)
            .finish_non_exhaustive()
    }
}

/// Read up to `limit` bytes of `body` ahead of the wrapped service.
///
/// Frames read so far are replayed to the service, followed by the rest of
/// the stream, so the service always sees the whole body while at most
/// `limit` bytes plus one frame are held in memory. A failing stream yields
/// no bytes and a replacement body that fails with the same error, so the
/// service still observes it.
pub async fn buffer<B>(body: B, limit: usize) -> Buffered
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let mut body = Box::pin(body);
    let mut frames = Vec::new();
    let mut logged = BytesMut::new();

    loop {
        match body.frame().await {
            None => {
                let logged = logged.freeze();
                let forwarded = if frames.iter().any(Frame::is_trailers) {
                    replay(frames)
                } else {
                    full(logged.clone())
                };
                return Buffered {
                    logged,
                    truncated: false,
                    forwarded,
                };
            }
            Some(Ok(frame)) => {
                let mut truncated = false;
                if let Some(data) = frame.data_ref() {
                    let room = limit.saturating_sub(logged.len());
                    truncated = data.len() > room;
                    logged.extend_from_slice(&data[..data.len().min(room)]);
                }
                frames.push(frame);
                if truncated {
                    break;
                }
            }
            Some(Err(err)) => {
                let err: BoxError = err.into();
                tracing::debug!(error = %err, "request body failed while buffering");
                return Buffered {
                    logged: Bytes::new(),
                    truncated: false,
                    forwarded: failed(err),
                };
            }
        }
    }

    let rest = TryStreamExt::map_err(BodyStream::new(body), Into::<BoxError>::into);
    let forwarded = StreamBody::new(read_ahead(frames).chain(rest)).boxed_unsync();
    Buffered {
        logged: logged.freeze(),
        truncated: true,
        forwarded,
    }
}

fn read_ahead(
    frames: Vec<Frame<Bytes>>,
) -> impl Stream<Item = Result<Frame<Bytes>, BoxError>> + Send + 'static {
    stream::iter(frames.into_iter().map(Ok::<_, BoxError>))
}

fn replay(frames: Vec<Frame<Bytes>>) -> BoxBody {
    StreamBody::new(read_ahead(frames)).boxed_unsync()
}

/// How the captured stream ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The stream reached its end
    Complete,
    /// The stream yielded an error
    Failed(String),
    /// The body was dropped before its end
    Dropped,
}

/// The bytes seen by a [`CapturedBody`]
#[derive(Clone, Debug)]
pub struct Capture {
    /// Captured data, at most the configured limit
    pub body: Bytes,
    /// Whether data beyond the limit was left out
    pub truncated: bool,
    /// How the stream ended
    pub outcome: CaptureOutcome,
}

impl Capture {
    /// The captured bytes to log, marked when truncated
    pub fn logged_body(&self) -> Bytes {
        mark_truncated(self.body.clone(), self.truncated)
    }
}

type OnComplete = Box<dyn FnOnce(Capture) + Send + Sync>;

struct Capturer {
    buffer: BytesMut,
    limit: usize,
    truncated: bool,
    on_complete: Option<OnComplete>,
}

impl Capturer {
    fn push(&mut self, data: &Bytes) {
        if self.on_complete.is_none() {
            return;
        }
        let room = self.limit.saturating_sub(self.buffer.len());
        if data.len() > room {
            self.truncated = true;
        }
        self.buffer
            .extend_from_slice(&data[..data.len().min(room)]);
    }

    fn finish(&mut self, outcome: CaptureOutcome) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(Capture {
                body: self.buffer.split().freeze(),
                truncated: self.truncated,
                outcome,
            });
        }
    }
}

impl Drop for Capturer {
    fn drop(&mut self) {
        self.finish(CaptureOutcome::Dropped);
    }
}

pin_project! {
    /// A body that records what passes through it
    ///
    /// Frames are forwarded unchanged; the wrapped body's data, trailers
    /// and errors reach the consumer exactly as they were produced.
    pub struct CapturedBody<B> {
        #[pin]
        inner: B,
        capture: Capturer,
    }
}

impl<B> CapturedBody<B> {
    /// Capture up to `limit` bytes of `inner`, then call `on_complete` once
    pub fn new<F>(inner: B, limit: usize, on_complete: F) -> Self
    where
        F: FnOnce(Capture) + Send + Sync + 'static,
    {
        Self {
            inner,
            capture: Capturer {
                buffer: BytesMut::new(),
                limit,
                truncated: false,
                on_complete: Some(Box::new(on_complete)),
            },
        }
    }

    /// Forward `inner` without capturing anything
    pub fn passthrough(inner: B) -> Self {
        Self {
            inner,
            capture: Capturer {
                buffer: BytesMut::new(),
                limit: 0,
                truncated: false,
                on_complete: None,
            },
        }
    }

    /// Whether a completion callback is still pending
    pub fn is_capturing(&self) -> bool {
        self.capture.on_complete.is_some()
    }

    /// Get a reference to the wrapped body
    pub fn get_ref(&self) -> &B {
        &self.inner
    }
}

impl<B> Body for CapturedBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: fmt::Display,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();
        match ready!(this.inner.as_mut().poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.capture.push(data);
                }
                if this.inner.is_end_stream() {
                    this.capture.finish(CaptureOutcome::Complete);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(err)) => {
                this.capture.finish(CaptureOutcome::Failed(err.to_string()));
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.capture.finish(CaptureOutcome::Complete);
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> fmt::Debug for CapturedBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedBody")
            .field("captured", &self.capture.buffer.len())
            .field("limit", &self.capture.limit)
            .field("capturing", &self.is_capturing())
            .finish()
    }
}
