//! Strategies decide whether and how an exchange is logged
//!
//! A strategy is consulted at every step of the pipeline. The default
//! methods log everything: the request record as soon as the request is
//! accepted, the response record when the response is complete.
//!
//! Strategies keep no state between invocations; concurrent exchanges never
//! observe each other through a strategy.

use crate::correlation::{Correlation, CorrelationId, Precorrelation};
use crate::error::Result;
use crate::message::{HttpRequest, HttpResponse};
use crate::sink::LogWriter;
use http::StatusCode;

/// Policy deciding whether and how an exchange is logged
pub trait Strategy: Send + Sync + 'static {
    /// Whether the exchange should be logged at all
    fn should_log(&self, _request: &HttpRequest) -> bool {
        true
    }

    /// Start the exchange's correlation
    fn correlate(&self, request: &HttpRequest, ids: &dyn CorrelationId) -> Precorrelation {
        Precorrelation::new(ids.generate(request))
    }

    /// Transform the request before it is filtered
    fn process_request(&self, request: HttpRequest) -> HttpRequest {
        request
    }

    /// Write the request record, or defer it
    fn write_request(
        &self,
        precorrelation: &Precorrelation,
        request: &HttpRequest,
        writer: &LogWriter,
    ) -> Result<()> {
        writer.write_request(precorrelation, request)
    }

    /// Transform the response before it is filtered
    fn process_response(&self, _request: &HttpRequest, response: HttpResponse) -> HttpResponse {
        response
    }

    /// Close the exchange's correlation
    fn correlate_response(
        &self,
        precorrelation: &Precorrelation,
        _response: &HttpResponse,
    ) -> Correlation {
        precorrelation.correlate()
    }

    /// Write the response record, plus any deferred request record
    fn write_response(
        &self,
        correlation: &Correlation,
        _request: &HttpRequest,
        response: &HttpResponse,
        writer: &LogWriter,
    ) -> Result<()> {
        writer.write_response(correlation, response)
    }
}

/// Logs every exchange in full
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultStrategy;

impl Strategy for DefaultStrategy {}

/// Logs an exchange only when its response status reaches a threshold.
///
/// The request record is held back until the response is known, then both
/// records are written together.
#[derive(Clone, Copy, Debug)]
pub struct StatusAtLeastStrategy {
    min: StatusCode,
}

impl StatusAtLeastStrategy {
    /// Log exchanges whose status is at least `min`
    pub fn new(min: StatusCode) -> Self {
        Self { min }
    }

    /// Log only client and server errors
    pub fn errors() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }
}

impl Strategy for StatusAtLeastStrategy {
    fn write_request(&self, _: &Precorrelation, _: &HttpRequest, _: &LogWriter) -> Result<()> {
        Ok(())
    }

    fn write_response(
        &self,
        correlation: &Correlation,
        request: &HttpRequest,
        response: &HttpResponse,
        writer: &LogWriter,
    ) -> Result<()> {
        if response.status() < self.min {
            return Ok(());
        }
        let request_result = writer.write_request(correlation.precorrelation(), request);
        let response_result = writer.write_response(correlation, response);
        request_result.and(response_result)
    }
}

/// Logs every exchange, but bodies only when the status reaches a threshold
#[derive(Clone, Copy, Debug)]
pub struct BodyOnlyIfStatusAtLeastStrategy {
    min: StatusCode,
}

impl BodyOnlyIfStatusAtLeastStrategy {
    /// Keep bodies of exchanges whose status is at least `min`
    pub fn new(min: StatusCode) -> Self {
        Self { min }
    }
}

impl Strategy for BodyOnlyIfStatusAtLeastStrategy {
    fn write_request(&self, _: &Precorrelation, _: &HttpRequest, _: &LogWriter) -> Result<()> {
        Ok(())
    }

    fn process_response(&self, _request: &HttpRequest, response: HttpResponse) -> HttpResponse {
        if response.status() >= self.min {
            response
        } else {
            response.without_body()
        }
    }

    fn write_response(
        &self,
        correlation: &Correlation,
        request: &HttpRequest,
        response: &HttpResponse,
        writer: &LogWriter,
    ) -> Result<()> {
        let request_result = if response.status() >= self.min {
            writer.write_request(correlation.precorrelation(), request)
        } else {
            writer.write_request(correlation.precorrelation(), &request.clone().without_body())
        };
        let response_result = writer.write_response(correlation, response);
        request_result.and(response_result)
    }
}

/// Logs every exchange without bodies
#[derive(Clone, Copy, Debug, Default)]
pub struct WithoutBodyStrategy;

impl Strategy for WithoutBodyStrategy {
    fn process_request(&self, request: HttpRequest) -> HttpRequest {
        request.without_body()
    }

    fn process_response(&self, _request: &HttpRequest, response: HttpResponse) -> HttpResponse {
        response.without_body()
    }
}

/// Logs a random fraction of exchanges
#[derive(Clone, Copy, Debug)]
pub struct SamplingStrategy {
    rate: f64,
}

impl SamplingStrategy {
    /// Log roughly `rate` of all exchanges; clamped to `0.0..=1.0`
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self { rate }
    }

    /// The sampling rate
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Strategy for SamplingStrategy {
    fn should_log(&self, _request: &HttpRequest) -> bool {
        self.rate >= 1.0 || rand::random::<f64>() < self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::DefaultCorrelationId;
    use crate::error::{LogError, Phase};
    use crate::formatter::DefaultHttpLogFormatter;
    use crate::message::Origin;
    use crate::sink::Sink;
    use http::Method;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<String>>>);

    impl Sink for Collect {
        fn write_request(&self, _: &Precorrelation, record: &str) -> io::Result<()> {
            self.0.lock().unwrap().push(record.to_string());
            Ok(())
        }

        fn write_response(&self, _: &Correlation, record: &str) -> io::Result<()> {
            self.0.lock().unwrap().push(record.to_string());
            Ok(())
        }
    }

    fn request() -> HttpRequest {
        HttpRequest::new(Origin::Remote, Method::POST, &"http://localhost/".parse().unwrap())
            .with_body("request body")
    }

    fn response(status: StatusCode) -> HttpResponse {
        HttpResponse::new(Origin::Local, status).with_body("response body")
    }

    fn run(strategy: &dyn Strategy, status: StatusCode) -> Vec<String> {
        let sink = Collect::default();
        let writer = LogWriter::new(DefaultHttpLogFormatter, sink.clone());
        let request = strategy.process_request(request());
        let precorrelation = strategy.correlate(&request, &DefaultCorrelationId);
        strategy
            .write_request(&precorrelation, &request, &writer)
            .unwrap();
        let response = strategy.process_response(&request, response(status));
        let correlation = strategy.correlate_response(&precorrelation, &response);
        strategy
            .write_response(&correlation, &request, &response, &writer)
            .unwrap();
        let records = sink.0.lock().unwrap().clone();
        records
    }

    #[test]
    fn test_default_writes_both() {
        let records = run(&DefaultStrategy, StatusCode::OK);
        assert_eq!(records.len(), 2);
        assert!(records[0].starts_with("Incoming Request"));
        assert!(records[1].starts_with("Outgoing Response"));
    }

    #[test]
    fn test_status_at_least_skips_success() {
        assert!(run(&StatusAtLeastStrategy::errors(), StatusCode::OK).is_empty());
    }

    #[test]
    fn test_status_at_least_writes_deferred_request() {
        let records = run(&StatusAtLeastStrategy::errors(), StatusCode::BAD_REQUEST);
        assert_eq!(records.len(), 2);
        assert!(records[0].starts_with("Incoming Request"));
        assert!(records[1].contains("400 Bad Request"));
    }

    #[test]
    fn test_body_only_if_status_at_least() {
        let strategy = BodyOnlyIfStatusAtLeastStrategy::new(StatusCode::BAD_REQUEST);
        let ok = run(&strategy, StatusCode::OK);
        assert_eq!(ok.len(), 2);
        assert!(!ok[0].contains("request body"));
        assert!(!ok[1].contains("response body"));

        let failed = run(&strategy, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(failed[0].contains("request body"));
        assert!(failed[1].contains("response body"));
    }

    #[test]
    fn test_without_body() {
        let records = run(&WithoutBodyStrategy, StatusCode::OK);
        assert!(!records[0].contains("request body"));
        assert!(!records[1].contains("response body"));
    }

    #[test]
    fn test_sampling_bounds() {
        let req = request();
        assert!((0..100).all(|_| SamplingStrategy::new(1.0).should_log(&req)));
        assert!((0..100).all(|_| !SamplingStrategy::new(0.0).should_log(&req)));
        assert_eq!(SamplingStrategy::new(7.0).rate(), 1.0);
        assert_eq!(SamplingStrategy::new(f64::NAN).rate(), 0.0);
    }

    #[test]
    fn test_status_at_least_reports_request_failure() {
        struct RequestFails;
        impl Sink for RequestFails {
            fn write_request(&self, _: &Precorrelation, _: &str) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::Other, "down"))
            }
            fn write_response(&self, _: &Correlation, _: &str) -> io::Result<()> {
                Ok(())
            }
        }
        let writer = LogWriter::new(DefaultHttpLogFormatter, RequestFails);
        let correlation = Precorrelation::new("x").correlate();
        let err = StatusAtLeastStrategy::errors()
            .write_response(&correlation, &request(), &response(StatusCode::BAD_GATEWAY), &writer)
            .unwrap_err();
        assert!(matches!(err, LogError::SinkWrite { phase: Phase::Request, .. }));
    }
}
