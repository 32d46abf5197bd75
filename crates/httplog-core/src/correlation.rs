//! Correlation of a logged request with its logged response

use crate::message::{HttpMessage, HttpRequest};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Identity and start time of an exchange whose response has not arrived yet
#[derive(Clone, Debug)]
pub struct Precorrelation {
    id: String,
    start: SystemTime,
    started: Instant,
}

impl Precorrelation {
    /// Start a new exchange now
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start: SystemTime::now(),
            started: Instant::now(),
        }
    }

    /// Start an exchange with an explicit wall-clock timestamp
    pub fn at(id: impl Into<String>, start: SystemTime) -> Self {
        Self {
            id: id.into(),
            start,
            started: Instant::now(),
        }
    }

    /// Correlation id shared by the request and the response record
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wall-clock time the exchange was accepted for logging
    pub fn start(&self) -> SystemTime {
        self.start
    }

    /// Close the exchange, measuring the elapsed time on a monotonic clock
    pub fn correlate(&self) -> Correlation {
        let duration = self.started.elapsed();
        Correlation {
            precorrelation: self.clone(),
            end: self.start + duration,
            duration,
        }
    }
}

/// A precorrelation whose response has arrived
#[derive(Clone, Debug)]
pub struct Correlation {
    precorrelation: Precorrelation,
    end: SystemTime,
    duration: Duration,
}

impl Correlation {
    /// Correlation id, identical to the precorrelation's
    pub fn id(&self) -> &str {
        self.precorrelation.id()
    }

    /// Wall-clock start of the exchange
    pub fn start(&self) -> SystemTime {
        self.precorrelation.start()
    }

    /// Wall-clock end of the exchange
    pub fn end(&self) -> SystemTime {
        self.end
    }

    /// Time between request acceptance and response arrival
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The precorrelation this correlation was created from
    pub fn precorrelation(&self) -> &Precorrelation {
        &self.precorrelation
    }
}

/// Generates correlation ids
pub trait CorrelationId: Send + Sync + 'static {
    /// Produce an id for the given request
    fn generate(&self, request: &HttpRequest) -> String;
}

impl<F> CorrelationId for F
where
    F: Fn(&HttpRequest) -> String + Send + Sync + 'static,
{
    fn generate(&self, request: &HttpRequest) -> String {
        self(request)
    }
}

/// 16 lowercase hex characters from a random 64-bit number
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCorrelationId;

impl CorrelationId for DefaultCorrelationId {
    fn generate(&self, _request: &HttpRequest) -> String {
        format!("{:016x}", rand::random::<u64>())
    }
}

/// Random version 4 UUIDs
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidCorrelationId;

impl CorrelationId for UuidCorrelationId {
    fn generate(&self, _request: &HttpRequest) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Reuses an id sent by the peer, generating one when the header is absent
#[derive(Clone)]
pub struct HeaderCorrelationId {
    header: String,
    fallback: Arc<dyn CorrelationId>,
}

impl HeaderCorrelationId {
    /// Read ids from `header`, falling back to [`DefaultCorrelationId`]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            fallback: Arc::new(DefaultCorrelationId),
        }
    }

    /// Use a different generator when the header is absent
    pub fn with_fallback(mut self, fallback: impl CorrelationId) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }
}

impl CorrelationId for HeaderCorrelationId {
    fn generate(&self, request: &HttpRequest) -> String {
        match request.headers().first(&self.header) {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => self.fallback.generate(request),
        }
    }
}
