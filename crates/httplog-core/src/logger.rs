//! The logging pipeline entry point
//!
//! [`HttpLogger`] bundles the condition, correlation id generator, strategy,
//! filter chains, formatter, sink and error handler of one logging setup. It
//! is cheap to clone and is shared by every exchange an adapter handles.
//!
//! # Example
//!
//! ```rust,ignore
//! use httplog_core::prelude::*;
//!
//! let logger = HttpLogger::builder()
//!     .strategy(StatusAtLeastStrategy::errors())
//!     .header_filter(header::replace_headers(["X-Api-Key"], "XXX"))
//!     .formatter(JsonHttpLogFormatter::new())
//!     .build();
//!
//! let stage = logger.process(request).write();
//! // ... later, once the response is complete
//! stage.process(response).write();
//! ```

use crate::correlation::{CorrelationId, DefaultCorrelationId};
use crate::error::{LogError, Phase};
use crate::filter::{
    self, BodyFilter, FilterChain, HeaderFilter, PathFilter, QueryFilter, RequestFilter,
    ResponseFilter,
};
use crate::formatter::{DefaultHttpLogFormatter, HttpLogFormatter};
use crate::message::HttpRequest;
use crate::sink::{LogWriter, Sink, TracingSink};
use crate::stage::{isolate, RequestWritingStage};
use crate::strategy::{DefaultStrategy, Strategy};
use std::fmt;
use std::sync::Arc;

/// Decides which requests are eligible for logging
pub type Condition = Arc<dyn Fn(&HttpRequest) -> bool + Send + Sync>;

/// Receives every pipeline failure
pub type ErrorHandler = Arc<dyn Fn(&LogError) + Send + Sync>;

pub(crate) struct Inner {
    pub(crate) condition: Option<Condition>,
    pub(crate) ids: Arc<dyn CorrelationId>,
    pub(crate) strategy: Arc<dyn Strategy>,
    pub(crate) request_filter: FilterChain<dyn RequestFilter>,
    pub(crate) response_filter: FilterChain<dyn ResponseFilter>,
    pub(crate) writer: LogWriter,
    pub(crate) on_error: ErrorHandler,
}

/// Logs HTTP requests and responses
#[derive(Clone)]
pub struct HttpLogger {
    inner: Arc<Inner>,
}

impl HttpLogger {
    /// Start configuring a logger
    pub fn builder() -> HttpLoggerBuilder {
        HttpLoggerBuilder::new()
    }

    /// A logger with every default: text records written to `tracing`
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub(crate) fn inner(&self) -> &Inner {
        &self.inner
    }

    /// Whether the sink currently accepts records
    pub fn is_active(&self) -> bool {
        self.inner.writer.is_active()
    }

    /// Accept a request into the pipeline.
    ///
    /// The returned stage is inert when the sink is inactive, the condition
    /// rejects the request or the strategy declines to log it. In that case
    /// nothing else is called for this exchange.
    pub fn process(&self, request: HttpRequest) -> RequestWritingStage {
        if !self.is_active() {
            return RequestWritingStage::noop();
        }

        let inner = &self.inner;
        let accepted = isolate(Phase::Request, || {
            let eligible = inner
                .condition
                .as_ref()
                .map_or(true, |condition| condition(&request));
            if !eligible || !inner.strategy.should_log(&request) {
                return None;
            }
            let precorrelation = inner.strategy.correlate(&request, inner.ids.as_ref());
            let request = inner.strategy.process_request(request);
            Some((precorrelation, request))
        });

        match accepted {
            Ok(Some((precorrelation, request))) => {
                RequestWritingStage::new(self.clone(), precorrelation, request)
            }
            Ok(None) => {
                tracing::trace!("request not eligible for logging");
                RequestWritingStage::noop()
            }
            Err(err) => {
                self.report(err);
                RequestWritingStage::noop()
            }
        }
    }

    /// Hand a pipeline failure to the error handler
    pub fn report(&self, error: LogError) {
        (self.inner.on_error)(&error);
    }
}

impl Default for HttpLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HttpLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLogger")
            .field("request_filters", &self.inner.request_filter.len())
            .field("response_filters", &self.inner.response_filter.len())
            .field("writer", &self.inner.writer)
            .finish_non_exhaustive()
    }
}

fn default_error_handler(error: &LogError) {
    tracing::warn!(
        error = %error,
        phase = error.phase().map(|p| p.as_str()).unwrap_or("unknown"),
        "failed to log HTTP exchange"
    );
}

/// Builder for [`HttpLogger`].
///
/// Every filter kind starts out with its built-in defaults. Adding the first
/// filter of a kind replaces those defaults; later filters of the same kind
/// are appended in order.
#[derive(Default)]
pub struct HttpLoggerBuilder {
    condition: Option<Condition>,
    ids: Option<Arc<dyn CorrelationId>>,
    strategy: Option<Arc<dyn Strategy>>,
    request_filters: Option<FilterChain<dyn RequestFilter>>,
    response_filters: Option<FilterChain<dyn ResponseFilter>>,
    header_filters: Option<FilterChain<dyn HeaderFilter>>,
    query_filters: Option<FilterChain<dyn QueryFilter>>,
    path_filters: Option<FilterChain<dyn PathFilter>>,
    body_filters: Option<FilterChain<dyn BodyFilter>>,
    formatter: Option<Arc<dyn HttpLogFormatter>>,
    sink: Option<Arc<dyn Sink>>,
    on_error: Option<ErrorHandler>,
}

impl HttpLoggerBuilder {
    /// Create a builder with every default
    pub fn new() -> Self {
        Self::default()
    }

    /// Only log requests matching the predicate
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&HttpRequest) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Never log requests whose path starts with one of the prefixes
    pub fn exclude_paths<I, S>(self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        let previous = self.condition.clone();
        self.condition(move |request: &HttpRequest| {
            !prefixes.iter().any(|p| request.path().starts_with(p.as_str()))
                && previous.as_ref().map_or(true, |condition| condition(request))
        })
    }

    /// Generate correlation ids with a different generator
    pub fn correlation_id(mut self, ids: impl CorrelationId) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    /// Use a different logging strategy
    pub fn strategy(mut self, strategy: impl Strategy) -> Self {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    /// Add a request filter, replacing the default body replacement
    pub fn request_filter(mut self, filter: impl RequestFilter) -> Self {
        self.request_filters = Some(self.request_filters.unwrap_or_default().then(filter));
        self
    }

    /// Add a response filter, replacing the default body replacement
    pub fn response_filter(mut self, filter: impl ResponseFilter) -> Self {
        self.response_filters = Some(self.response_filters.unwrap_or_default().then(filter));
        self
    }

    /// Add a header filter, replacing the default authorization masking
    pub fn header_filter(mut self, filter: impl HeaderFilter) -> Self {
        self.header_filters = Some(self.header_filters.unwrap_or_default().then(filter));
        self
    }

    /// Add a query filter, replacing the default access token masking
    pub fn query_filter(mut self, filter: impl QueryFilter) -> Self {
        self.query_filters = Some(self.query_filters.unwrap_or_default().then(filter));
        self
    }

    /// Add a path filter
    pub fn path_filter(mut self, filter: impl PathFilter) -> Self {
        self.path_filters = Some(self.path_filters.unwrap_or_default().then(filter));
        self
    }

    /// Add a body filter, replacing the default credential masking
    pub fn body_filter(mut self, filter: impl BodyFilter) -> Self {
        self.body_filters = Some(self.body_filters.unwrap_or_default().then(filter));
        self
    }

    /// Render records with a different formatter
    pub fn formatter(mut self, formatter: impl HttpLogFormatter) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Send records to a different sink
    pub fn sink(mut self, sink: impl Sink) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Send records to an already shared sink
    pub fn shared_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Handle pipeline failures; the default logs them with `tracing::warn!`
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LogError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Compose the filter chains and build the logger
    pub fn build(self) -> HttpLogger {
        let headers = self.header_filters.unwrap_or_else(|| {
            FilterChain::<dyn HeaderFilter>::new().then(filter::header::default_value())
        });
        let bodies = self
            .body_filters
            .unwrap_or_else(filter::body::default_value);
        let queries = self.query_filters.unwrap_or_else(|| {
            FilterChain::<dyn QueryFilter>::new().then(filter::query::default_value())
        });

        let mut request_filter = self.request_filters.unwrap_or_else(|| {
            FilterChain::<dyn RequestFilter>::new().then(filter::request::default_value())
        });
        request_filter = request_filter.then(filter::request::query(queries));
        if let Some(paths) = self.path_filters {
            request_filter = request_filter.then(filter::request::path(paths));
        }
        let request_filter = request_filter
            .then(filter::request::headers(headers.clone()))
            .then(filter::request::body(bodies.clone()));

        let response_filter = self
            .response_filters
            .unwrap_or_else(|| {
                FilterChain::<dyn ResponseFilter>::new().then(filter::response::default_value())
            })
            .then(filter::response::headers(headers))
            .then(filter::response::body(bodies));

        let formatter = self
            .formatter
            .unwrap_or_else(|| Arc::new(DefaultHttpLogFormatter::new()));
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingSink::default()));

        HttpLogger {
            inner: Arc::new(Inner {
                condition: self.condition,
                ids: self.ids.unwrap_or_else(|| Arc::new(DefaultCorrelationId)),
                strategy: self.strategy.unwrap_or_else(|| Arc::new(DefaultStrategy)),
                request_filter,
                response_filter,
                writer: LogWriter::from_shared(formatter, sink),
                on_error: self
                    .on_error
                    .unwrap_or_else(|| Arc::new(default_error_handler)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::header;
    use crate::headers::HttpHeaders;
    use crate::message::{HttpResponse, Origin};
    use crate::strategy::StatusAtLeastStrategy;
    use crate::testing::{Record, RecordingSink, TestStrategy};
    use http::{Method, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn request() -> HttpRequest {
        HttpRequest::new(Origin::Remote, Method::GET, &"http://localhost/test?access_token=t".parse().unwrap())
            .with_remote("127.0.0.1")
            .with_headers([("Authorization", "Bearer secret")].into_iter().collect())
    }

    fn response() -> HttpResponse {
        HttpResponse::new(Origin::Local, StatusCode::OK)
            .with_headers([("Content-Type", "text/plain")].into_iter().collect())
            .with_body("Hello, world!")
    }

    fn run(logger: &HttpLogger) {
        logger.process(request()).write().process(response()).write();
    }

    #[test]
    fn test_full_exchange_with_defaults() {
        let sink = RecordingSink::new();
        let logger = HttpLogger::builder().sink(sink.clone()).build();
        run(&logger);

        let records = sink.records();
        assert_eq!(records.len(), 2);
        let (request, response) = (&records[0], &records[1]);
        assert_eq!(request.correlation, response.correlation);
        assert!(request.text.contains("Authorization: XXX"));
        assert!(request.text.contains("access_token=XXX"));
        assert!(!request.text.contains("secret"));
        assert!(response.text.contains("HTTP/1.1 200 OK"));
        assert!(response.text.ends_with("Hello, world!"));
    }

    #[test]
    fn test_inactive_sink_calls_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (c1, c2, c3) = (calls.clone(), calls.clone(), calls.clone());
        let sink = RecordingSink::new();
        sink.set_active(false);
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .condition(move |_| {
                c1.fetch_add(1, Ordering::SeqCst);
                true
            })
            .request_filter(move |req: HttpRequest| {
                c2.fetch_add(1, Ordering::SeqCst);
                req
            })
            .header_filter(move |headers: HttpHeaders| {
                c3.fetch_add(1, Ordering::SeqCst);
                headers
            })
            .build();

        let stage = logger.process(request());
        assert!(stage.is_noop());
        stage.write().process(response()).write();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_condition_and_exclusions() {
        let sink = RecordingSink::new();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .exclude_paths(["/health"])
            .build();

        let health = HttpRequest::new(Origin::Remote, Method::GET, &"/health/live".parse().unwrap());
        assert!(logger.process(health).is_noop());
        assert!(!logger.process(request()).is_noop());
    }

    #[test]
    fn test_custom_filter_replaces_default() {
        let sink = RecordingSink::new();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .header_filter(header::none())
            .build();
        run(&logger);
        assert!(sink.records()[0].text.contains("Authorization: Bearer secret"));
    }

    #[test]
    fn test_request_failure_does_not_block_response() {
        let sink = RecordingSink::new();
        sink.fail_requests(true);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = errors.clone();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .on_error(move |err| seen.lock().unwrap().push(err.phase()))
            .build();
        run(&logger);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].phase, Phase::Response);
        assert_eq!(*errors.lock().unwrap(), vec![Some(Phase::Request)]);
    }

    #[test]
    fn test_panicking_filter_is_isolated() {
        let sink = RecordingSink::new();
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = errors.clone();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .response_filter(|_: HttpResponse| -> HttpResponse { panic!("boom") })
            .on_error(move |err| {
                assert!(matches!(err, LogError::Panicked { phase: Phase::Response }));
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        run(&logger);

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].phase, Phase::Request);
    }

    #[test]
    fn test_panicking_request_filter_keeps_response() {
        let sink = RecordingSink::new();
        let phases = Arc::new(Mutex::new(Vec::new()));
        let seen = phases.clone();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .request_filter(|_: HttpRequest| -> HttpRequest { panic!("boom") })
            .on_error(move |err| seen.lock().unwrap().push(err.phase()))
            .build();
        run(&logger);

        assert_eq!(*phases.lock().unwrap(), vec![Some(Phase::Request)]);
        assert_eq!(sink.request_count(), 0);
        assert_eq!(sink.response_count(), 1);
        assert!(sink.records()[0].text.ends_with("Hello, world!"));
    }

    #[test]
    fn test_deferred_request_after_filter_failure_is_stripped() {
        let sink = RecordingSink::new();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .strategy(StatusAtLeastStrategy::new(StatusCode::OK))
            .request_filter(|_: HttpRequest| -> HttpRequest { panic!("boom") })
            .on_error(|_| {})
            .build();
        run(&logger);

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].phase, Phase::Request);
        assert!(records[0].text.contains("GET http://localhost/test HTTP/1.1"));
        assert!(!records[0].text.contains("secret"));
        assert!(!records[0].text.contains("access_token"));
        assert_eq!(records[1].phase, Phase::Response);
    }

    #[test]
    fn test_should_log_false_writes_nothing() {
        let sink = RecordingSink::new();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .strategy(TestStrategy::new("fixed").skip_all())
            .build();
        run(&logger);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_fixed_correlation_id() {
        let sink = RecordingSink::new();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .strategy(TestStrategy::new("fixed"))
            .build();
        run(&logger);
        let ids: Vec<String> = sink.records().into_iter().map(|r: Record| r.correlation).collect();
        assert_eq!(ids, vec!["fixed".to_string(), "fixed".to_string()]);
    }

    #[test]
    fn test_binary_response_body_is_replaced() {
        let sink = RecordingSink::new();
        let logger = HttpLogger::builder().sink(sink.clone()).build();
        let binary = HttpResponse::new(Origin::Local, StatusCode::OK)
            .with_headers([("Content-Type", "image/png")].into_iter().collect())
            .with_body(vec![0x89, 0x50, 0x4e, 0x47]);
        logger.process(request()).write().process(binary).write();
        assert!(sink.records()[1].text.ends_with("\n\n<binary>"));
    }

    #[test]
    fn test_processing_stage_can_be_cloned_across_threads() {
        let sink = RecordingSink::new();
        let logger = HttpLogger::builder().sink(sink.clone()).build();
        let stage = logger.process(request()).write();
        let id = stage.correlation_id().map(str::to_string);

        let handle = std::thread::spawn({
            let stage = stage.clone();
            move || stage.process(response()).write()
        });
        handle.join().unwrap();

        assert_eq!(sink.records().len(), 2);
        assert_eq!(Some(sink.records()[1].correlation.clone()), id);
    }
}
