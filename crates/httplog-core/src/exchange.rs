//! Exchange-scoped state shared between dispatches and completion callbacks
//!
//! An [`Exchange`] lives as long as one request/response pair. It caches the
//! [`ResponseProcessingStage`] created on the first dispatch and guards the
//! response write so it happens at most once, no matter how many completion
//! notifications arrive or on which thread.
//!
//! Adapters store exchanges in the request's `http::Extensions` through
//! [`ExchangeSlots`], keyed by the id of the layer that owns them.

use crate::body::{Capture, CaptureOutcome};
use crate::error::{LogError, Result};
use crate::logger::HttpLogger;
use crate::message::HttpResponse;
use crate::stage::ResponseProcessingStage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Atomic check-and-set flag marking that a response was written
#[derive(Debug, Default)]
pub struct WriteOnceGuard {
    written: AtomicBool,
}

impl WriteOnceGuard {
    /// Create an unset guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for exactly one caller
    pub fn try_acquire(&self) -> bool {
        self.written
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether some caller already acquired the guard
    pub fn is_written(&self) -> bool {
        self.written.load(Ordering::Acquire)
    }
}

/// State of one logged request/response pair
#[derive(Debug, Default)]
pub struct Exchange {
    processing: OnceLock<ResponseProcessingStage>,
    guard: WriteOnceGuard,
}

impl Exchange {
    /// Create an exchange with no cached stage
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache the stage produced by the first dispatch.
    ///
    /// `init` runs at most once; later calls return the cached stage.
    pub fn begin(&self, init: impl FnOnce() -> ResponseProcessingStage) -> &ResponseProcessingStage {
        self.processing.get_or_init(init)
    }

    /// The stage cached by the first dispatch
    pub fn resume(&self) -> Result<&ResponseProcessingStage> {
        self.processing.get().ok_or(LogError::MissingStage)
    }

    /// Build the response view and write it, at most once per exchange.
    ///
    /// `response` is only invoked by the call that wins the guard.
    pub fn complete_with(&self, response: impl FnOnce() -> HttpResponse) -> Result<bool> {
        let stage = self.resume()?;
        if !self.guard.try_acquire() {
            return Ok(false);
        }
        stage.process(response()).write();
        Ok(true)
    }

    /// Whether the response record was handled
    pub fn is_complete(&self) -> bool {
        self.guard.is_written()
    }

    /// A completion callback for a [`CapturedBody`](crate::body::CapturedBody).
    ///
    /// `head` carries the response status, version and headers; the captured
    /// bytes become its body, followed by
    /// [`TRUNCATION_MARKER`](crate::body::TRUNCATION_MARKER) when the body
    /// outgrew the capture limit. A failed stream is reported as
    /// [`LogError::BufferFlush`] and logged with whatever was captured.
    pub fn completion(
        self: Arc<Self>,
        logger: HttpLogger,
        head: HttpResponse,
    ) -> impl FnOnce(Capture) + Send + Sync + 'static {
        move |capture: Capture| {
            if let CaptureOutcome::Failed(message) = &capture.outcome {
                logger.report(LogError::BufferFlush(message.clone()));
            }
            match self.complete_with(|| head.with_body(capture.logged_body())) {
                Ok(true) => {}
                Ok(false) => tracing::debug!("response already logged for this exchange"),
                Err(err) => logger.report(err),
            }
        }
    }
}

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// A process-unique id for a logging layer instance
pub fn next_owner_id() -> u64 {
    NEXT_OWNER.fetch_add(1, Ordering::Relaxed)
}

/// Exchanges attached to one request, one per owning layer
///
/// Stored in `http::Extensions`, so two logging layers stacked on the same
/// service each see only their own exchange.
#[derive(Clone, Debug, Default)]
pub struct ExchangeSlots {
    slots: Vec<(u64, Arc<Exchange>)>,
}

impl ExchangeSlots {
    /// The exchange owned by `owner`, if any
    pub fn get(&self, owner: u64) -> Option<Arc<Exchange>> {
        self.slots
            .iter()
            .find(|(id, _)| *id == owner)
            .map(|(_, exchange)| Arc::clone(exchange))
    }

    /// Attach an exchange for `owner`, replacing any previous one
    pub fn insert(&mut self, owner: u64, exchange: Arc<Exchange>) {
        self.slots.retain(|(id, _)| *id != owner);
        self.slots.push((owner, exchange));
    }

    /// Number of attached exchanges
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no exchange is attached
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
