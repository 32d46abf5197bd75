//! Test helpers for code built on httplog
//!
//! Enabled for this crate's own tests and, through the `test-utils`
//! feature, for adapters and applications.

use crate::correlation::{Correlation, CorrelationId, Precorrelation};
use crate::error::Phase;
use crate::message::HttpRequest;
use crate::sink::Sink;
use crate::strategy::Strategy;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A record captured by [`RecordingSink`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Whether this is a request or response record
    pub phase: Phase,
    /// Correlation id the record was written with
    pub correlation: String,
    /// The formatted record
    pub text: String,
}

#[derive(Default)]
struct State {
    records: Mutex<Vec<Record>>,
    inactive: AtomicBool,
    fail_requests: AtomicBool,
    fail_responses: AtomicBool,
}

/// A sink that keeps every record in memory
///
/// Clones share the same storage, so a test can hand one clone to the
/// logger and inspect another.
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<State>,
}

impl RecordingSink {
    /// Create an active, empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle [`Sink::is_active`]
    pub fn set_active(&self, active: bool) {
        self.state.inactive.store(!active, Ordering::SeqCst);
    }

    /// Make every request write fail
    pub fn fail_requests(&self, fail: bool) {
        self.state.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Make every response write fail
    pub fn fail_responses(&self, fail: bool) {
        self.state.fail_responses.store(fail, Ordering::SeqCst);
    }

    /// All records written so far, in order
    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Number of request records written
    pub fn request_count(&self) -> usize {
        self.count(Phase::Request)
    }

    /// Number of response records written
    pub fn response_count(&self) -> usize {
        self.count(Phase::Response)
    }

    /// Forget every record
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn count(&self, phase: Phase) -> usize {
        self.lock().iter().filter(|r| r.phase == phase).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.state
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, phase: Phase, correlation: &str, text: &str, fail: &AtomicBool) -> io::Result<()> {
        if fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "recording sink set to fail"));
        }
        self.lock().push(Record {
            phase,
            correlation: correlation.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

impl Sink for RecordingSink {
    fn is_active(&self) -> bool {
        !self.state.inactive.load(Ordering::SeqCst)
    }

    fn write_request(&self, precorrelation: &Precorrelation, record: &str) -> io::Result<()> {
        self.push(
            Phase::Request,
            precorrelation.id(),
            record,
            &self.state.fail_requests,
        )
    }

    fn write_response(&self, correlation: &Correlation, record: &str) -> io::Result<()> {
        self.push(
            Phase::Response,
            correlation.id(),
            record,
            &self.state.fail_responses,
        )
    }
}

impl std::fmt::Debug for RecordingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSink")
            .field("records", &self.lock().len())
            .field("active", &self.is_active())
            .finish()
    }
}

/// A strategy with a fixed correlation id, optionally declining everything
#[derive(Clone, Debug)]
pub struct TestStrategy {
    id: String,
    log: bool,
}

impl TestStrategy {
    /// Correlate every exchange with `id`
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            log: true,
        }
    }

    /// Decline every exchange in `should_log`
    pub fn skip_all(mut self) -> Self {
        self.log = false;
        self
    }
}

impl Strategy for TestStrategy {
    fn should_log(&self, _request: &HttpRequest) -> bool {
        self.log
    }

    fn correlate(&self, _request: &HttpRequest, _ids: &dyn CorrelationId) -> Precorrelation {
        Precorrelation::new(self.id.clone())
    }
}
