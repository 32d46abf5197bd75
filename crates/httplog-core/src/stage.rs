//! The staged request/response pipeline
//!
//! ```text
//! HttpLogger::process(request)
//!     -> RequestWritingStage::write()
//!     -> ResponseProcessingStage::process(response)
//!     -> ResponseWritingStage::write()
//! ```
//!
//! Every transition consumes or borrows the previous stage, so a response
//! can only be written after its request was. A stage created for an
//! exchange that is not logged is inert: all later stages are no-ops and no
//! filter, strategy, formatter or sink call happens.

use crate::correlation::Precorrelation;
use crate::error::{LogError, Phase, Result};
use crate::filter::{RequestFilter, ResponseFilter};
use crate::headers::HttpHeaders;
use crate::logger::HttpLogger;
use crate::message::{HttpRequest, HttpResponse};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Run a piece of user code, turning a panic into a [`LogError::Panicked`]
pub(crate) fn isolate<T>(phase: Phase, f: impl FnOnce() -> T) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|_| LogError::Panicked { phase })
}

struct Accepted {
    logger: HttpLogger,
    precorrelation: Precorrelation,
    request: HttpRequest,
}

/// A request accepted for logging whose record has not been written yet
#[must_use = "the request record is only written by `write`"]
pub struct RequestWritingStage {
    accepted: Option<Accepted>,
}

impl RequestWritingStage {
    pub(crate) fn new(logger: HttpLogger, precorrelation: Precorrelation, request: HttpRequest) -> Self {
        Self {
            accepted: Some(Accepted {
                logger,
                precorrelation,
                request,
            }),
        }
    }

    /// A stage for an exchange that is not logged
    pub fn noop() -> Self {
        Self { accepted: None }
    }

    /// Whether this exchange produces no records
    pub fn is_noop(&self) -> bool {
        self.accepted.is_none()
    }

    /// The correlation id of a logged exchange
    pub fn correlation_id(&self) -> Option<&str> {
        self.accepted.as_ref().map(|a| a.precorrelation.id())
    }

    /// Filter the request and hand its record to the strategy.
    ///
    /// A failing filter, formatter or sink is reported and does not keep the
    /// response record from being written later. When the filters fail the
    /// request record is skipped.
    pub fn write(self) -> ResponseProcessingStage {
        let Some(Accepted {
            logger,
            precorrelation,
            request,
        }) = self.accepted
        else {
            return ResponseProcessingStage::noop();
        };

        let inner = logger.inner();
        let unfiltered = request.clone();
        match isolate(Phase::Request, || inner.request_filter.filter(request)) {
            Ok(request) => {
                let written = isolate(Phase::Request, || {
                    inner
                        .strategy
                        .write_request(&precorrelation, &request, &inner.writer)
                })
                .and_then(|result| result);
                if let Err(err) = written {
                    logger.report(err);
                }
                ResponseProcessingStage::pending(logger, precorrelation, request)
            }
            Err(err) => {
                logger.report(err);
                let request = unfiltered_fallback(unfiltered);
                ResponseProcessingStage::pending(logger, precorrelation, request)
            }
        }
    }
}

/// What is kept of a request whose filters failed: method, URI path and
/// protocol. Query, headers and body are dropped unredacted.
fn unfiltered_fallback(request: HttpRequest) -> HttpRequest {
    request
        .with_query("")
        .with_headers(HttpHeaders::new())
        .without_body()
}

struct Pending {
    logger: HttpLogger,
    precorrelation: Precorrelation,
    request: HttpRequest,
}

/// Waits for the response of a request whose record was handled.
///
/// This stage is cheap to clone and is what adapters keep around while the
/// response is produced, possibly on another thread.
#[derive(Clone, Default)]
pub struct ResponseProcessingStage {
    pending: Option<Arc<Pending>>,
}

impl ResponseProcessingStage {
    fn pending(logger: HttpLogger, precorrelation: Precorrelation, request: HttpRequest) -> Self {
        Self {
            pending: Some(Arc::new(Pending {
                logger,
                precorrelation,
                request,
            })),
        }
    }

    /// A stage for an exchange that is not logged
    pub fn noop() -> Self {
        Self { pending: None }
    }

    /// Whether this exchange produces no records
    pub fn is_noop(&self) -> bool {
        self.pending.is_none()
    }

    /// The correlation id of a logged exchange
    pub fn correlation_id(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.precorrelation.id())
    }

    /// Hand the response to the strategy
    pub fn process(&self, response: HttpResponse) -> ResponseWritingStage {
        let Some(pending) = &self.pending else {
            return ResponseWritingStage::noop();
        };

        let strategy = &pending.logger.inner().strategy;
        match isolate(Phase::Response, || {
            strategy.process_response(&pending.request, response)
        }) {
            Ok(response) => ResponseWritingStage {
                ready: Some((Arc::clone(pending), response)),
            },
            Err(err) => {
                pending.logger.report(err);
                ResponseWritingStage::noop()
            }
        }
    }
}

impl std::fmt::Debug for ResponseProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseProcessingStage")
            .field("correlation", &self.correlation_id())
            .finish()
    }
}

/// Everything needed to write the response record
#[must_use = "the response record is only written by `write`"]
pub struct ResponseWritingStage {
    ready: Option<(Arc<Pending>, HttpResponse)>,
}

impl ResponseWritingStage {
    /// A stage for an exchange that is not logged
    pub fn noop() -> Self {
        Self { ready: None }
    }

    /// Whether this exchange produces no records
    pub fn is_noop(&self) -> bool {
        self.ready.is_none()
    }

    /// Filter the response and hand its record to the strategy
    pub fn write(self) {
        let Some((pending, response)) = self.ready else {
            return;
        };

        let inner = pending.logger.inner();
        let written = isolate(Phase::Response, || {
            let correlation = inner
                .strategy
                .correlate_response(&pending.precorrelation, &response);
            let response = inner.response_filter.filter(response);
            inner
                .strategy
                .write_response(&correlation, &pending.request, &response, &inner.writer)
        })
        .and_then(|result| result);

        if let Err(err) = written {
            pending.logger.report(err);
        }
    }
}
