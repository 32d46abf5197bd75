//! Sinks receive formatted records
//!
//! A sink is the last hop of the pipeline. The pipeline asks
//! [`Sink::is_active`] before doing any work for an exchange, so an inactive
//! sink costs nothing beyond that call.

use crate::correlation::{Correlation, Precorrelation};
use crate::error::{LogError, Phase, Result};
use crate::formatter::HttpLogFormatter;
use crate::message::{HttpRequest, HttpResponse};
use std::io;
use std::sync::Arc;
use tracing::Level;

/// Destination of formatted log records
pub trait Sink: Send + Sync + 'static {
    /// Whether records should be produced at all
    fn is_active(&self) -> bool {
        true
    }

    /// Write a request record
    fn write_request(&self, precorrelation: &Precorrelation, record: &str) -> io::Result<()>;

    /// Write a response record
    fn write_response(&self, correlation: &Correlation, record: &str) -> io::Result<()>;
}

/// Emits records as `tracing` events with a `correlation` field
#[derive(Clone, Debug)]
pub struct TracingSink {
    level: Level,
}

impl TracingSink {
    /// Emit records at the given level
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

macro_rules! emit {
    ($level:expr, $($rest:tt)+) => {
        match $level {
            Level::ERROR => tracing::event!(target: "httplog", Level::ERROR, $($rest)+),
            Level::WARN => tracing::event!(target: "httplog", Level::WARN, $($rest)+),
            Level::INFO => tracing::event!(target: "httplog", Level::INFO, $($rest)+),
            Level::DEBUG => tracing::event!(target: "httplog", Level::DEBUG, $($rest)+),
            _ => tracing::event!(target: "httplog", Level::TRACE, $($rest)+),
        }
    };
}

impl Sink for TracingSink {
    fn is_active(&self) -> bool {
        match self.level {
            Level::ERROR => tracing::enabled!(target: "httplog", Level::ERROR),
            Level::WARN => tracing::enabled!(target: "httplog", Level::WARN),
            Level::INFO => tracing::enabled!(target: "httplog", Level::INFO),
            Level::DEBUG => tracing::enabled!(target: "httplog", Level::DEBUG),
            _ => tracing::enabled!(target: "httplog", Level::TRACE),
        }
    }

    fn write_request(&self, precorrelation: &Precorrelation, record: &str) -> io::Result<()> {
        emit!(self.level, correlation = %precorrelation.id(), "{}", record);
        Ok(())
    }

    fn write_response(&self, correlation: &Correlation, record: &str) -> io::Result<()> {
        let duration_ms = crate::formatter::duration_millis(correlation.duration());
        emit!(
            self.level,
            correlation = %correlation.id(),
            duration_ms,
            "{}",
            record
        );
        Ok(())
    }
}

/// A sink that is never active; every exchange becomes a no-op
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledSink;

impl Sink for DisabledSink {
    fn is_active(&self) -> bool {
        false
    }

    fn write_request(&self, _: &Precorrelation, _: &str) -> io::Result<()> {
        Ok(())
    }

    fn write_response(&self, _: &Correlation, _: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Pairs a formatter with a sink; strategies write through it
#[derive(Clone)]
pub struct LogWriter {
    formatter: Arc<dyn HttpLogFormatter>,
    sink: Arc<dyn Sink>,
}

impl LogWriter {
    /// Create a writer from a formatter and a sink
    pub fn new(formatter: impl HttpLogFormatter, sink: impl Sink) -> Self {
        Self::from_shared(Arc::new(formatter), Arc::new(sink))
    }

    /// Create a writer from already shared parts
    pub fn from_shared(formatter: Arc<dyn HttpLogFormatter>, sink: Arc<dyn Sink>) -> Self {
        Self { formatter, sink }
    }

    /// Whether the sink accepts records
    pub fn is_active(&self) -> bool {
        self.sink.is_active()
    }

    /// Format and write a request record
    pub fn write_request(&self, precorrelation: &Precorrelation, request: &HttpRequest) -> Result<()> {
        let record = self.formatter.format_request(precorrelation, request)?;
        self.sink
            .write_request(precorrelation, &record)
            .map_err(|e| LogError::sink(Phase::Request, e))
    }

    /// Format and write a response record
    pub fn write_response(&self, correlation: &Correlation, response: &HttpResponse) -> Result<()> {
        let record = self.formatter.format_response(correlation, response)?;
        self.sink
            .write_response(correlation, &record)
            .map_err(|e| LogError::sink(Phase::Response, e))
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter").finish_non_exhaustive()
    }
}
