//! The server-side logging layer

use crate::form::{self, Handling};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{Request, Response};
use http_body::Body;
use httplog_core::body::{self, BoxBody, CapturedBody};
use httplog_core::exchange::next_owner_id;
use httplog_core::{
    BoxError, ConfigError, Exchange, ExchangeSlots, FormRequestMode, HttpLogger, HttpRequest,
    HttpResponse, LogbookConfig, Origin,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Default number of response body bytes kept for logging: 1MB
pub const DEFAULT_CAPTURE_LIMIT: usize = 1024 * 1024;

/// Layer that logs every request a service receives and the response it sends
///
/// # Example
///
/// ```rust,ignore
/// use httplog_server::LogbookLayer;
/// use httplog_core::{HttpLogger, StatusAtLeastStrategy};
/// use tower::ServiceBuilder;
///
/// let logger = HttpLogger::builder()
///     .strategy(StatusAtLeastStrategy::errors())
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(LogbookLayer::new(logger))
///     .service(app);
/// ```
#[derive(Clone, Debug)]
pub struct LogbookLayer {
    logger: HttpLogger,
    form_mode: FormRequestMode,
    capture_limit: usize,
    owner: u64,
}

impl LogbookLayer {
    /// Create a layer logging through `logger`
    pub fn new(logger: HttpLogger) -> Self {
        Self {
            logger,
            form_mode: FormRequestMode::default(),
            capture_limit: DEFAULT_CAPTURE_LIMIT,
            owner: next_owner_id(),
        }
    }

    /// Create a layer from settings
    pub fn from_config(config: &LogbookConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(HttpLogger::from_config(config)?).form_request_mode(config.form_request_mode))
    }

    /// Choose how form request bodies are logged
    pub fn form_request_mode(mut self, mode: FormRequestMode) -> Self {
        self.form_mode = mode;
        self
    }

    /// Keep at most `limit` response body bytes for logging
    pub fn capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = limit;
        self
    }

    /// The logger this layer writes through
    pub fn logger(&self) -> &HttpLogger {
        &self.logger
    }
}

impl<S> Layer<S> for LogbookLayer {
    type Service = LogbookService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LogbookService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service produced by [`LogbookLayer`]
///
/// The wrapped service always receives the request with a replayable body
/// and its response is returned unchanged, apart from a body wrapper that
/// observes the frames on their way to the client.
#[derive(Clone, Debug)]
pub struct LogbookService<S> {
    inner: S,
    layer: LogbookLayer,
}

impl<S> LogbookService<S> {
    /// Get a reference to the wrapped service
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, F, ReqBody, ResBody> Service<Request<ReqBody>> for LogbookService<S>
where
    S: Service<Request<BoxBody>, Response = Response<ResBody>, Future = F> + Clone + Send + 'static,
    F: Future<Output = Result<Response<ResBody>, S::Error>> + Send + 'static,
    ReqBody: Body<Data = Bytes> + Send + 'static,
    ReqBody::Error: Into<BoxError>,
    ResBody: Send + 'static,
{
    type Response = Response<CapturedBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let LogbookLayer {
            logger,
            form_mode,
            capture_limit,
            owner,
        } = self.layer.clone();

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();

            let resumed = parts
                .extensions
                .get::<ExchangeSlots>()
                .and_then(|slots| slots.get(owner));
            if let Some(exchange) = resumed {
                match exchange.resume() {
                    Ok(_) => tracing::debug!("resumed dispatch, response is logged by the initial one"),
                    Err(err) => tracing::debug!(error = %err, "resumed dispatch, nothing to write"),
                }
                let response = inner.call(Request::from_parts(parts, body::boxed(body))).await?;
                return Ok(response.map(CapturedBody::passthrough));
            }

            if !logger.is_active() {
                let response = inner.call(Request::from_parts(parts, body::boxed(body))).await?;
                return Ok(response.map(CapturedBody::passthrough));
            }

            let (logged, forwarded) = match form::handling(&parts.headers, form_mode) {
                Handling::Buffer => {
                    let buffered = body::buffer(body, capture_limit).await;
                    (buffered.logged_body(), buffered.forwarded)
                }
                Handling::Normalize => {
                    let buffered = body::buffer(body, capture_limit).await;
                    let normalized = form::normalize(&buffered.logged);
                    (
                        body::mark_truncated(normalized, buffered.truncated),
                        buffered.forwarded,
                    )
                }
                Handling::Stream => (Bytes::new(), body::boxed(body)),
            };

            let remote = parts
                .extensions
                .get::<SocketAddr>()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let view = HttpRequest::from_parts(Origin::Remote, &parts, logged).with_remote(remote);

            let exchange = Arc::new(Exchange::new());
            let skipped = exchange.begin(|| logger.process(view).write()).is_noop();
            if skipped {
                let response = inner.call(Request::from_parts(parts, forwarded)).await?;
                return Ok(response.map(CapturedBody::passthrough));
            }

            let mut slots = parts
                .extensions
                .get::<ExchangeSlots>()
                .cloned()
                .unwrap_or_default();
            slots.insert(owner, Arc::clone(&exchange));
            parts.extensions.insert(slots);

            let response = inner.call(Request::from_parts(parts, forwarded)).await?;
            let (parts, body) = response.into_parts();
            let head = HttpResponse::from_parts(Origin::Local, &parts, Bytes::new());
            let body = CapturedBody::new(body, capture_limit, exchange.completion(logger, head));
            Ok(Response::from_parts(parts, body))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use httplog_core::testing::{RecordingSink, TestStrategy};
    use httplog_core::{LogError, Phase};
    use std::convert::Infallible;
    use std::sync::Mutex;
    use tower::{service_fn, ServiceExt};

    async fn echo(request: Request<BoxBody>) -> Result<Response<BoxBody>, Infallible> {
        let bytes = request.into_body().collect().await.map(|c| c.to_bytes());
        let body = match bytes {
            Ok(bytes) if bytes.is_empty() => body::full("Hello, world!"),
            Ok(bytes) => body::full(bytes),
            Err(_) => body::full("request body failed"),
        };
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .body(body)
            .unwrap())
    }

    fn logger(sink: &RecordingSink) -> HttpLogger {
        HttpLogger::builder().sink(sink.clone()).build()
    }

    fn get(uri: &str) -> Request<BoxBody> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(body::empty())
            .unwrap()
    }

    async fn read<B>(response: Response<CapturedBody<B>>) -> Bytes
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Debug + std::fmt::Display,
    {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_logs_request_and_response() {
        let sink = RecordingSink::new();
        let service = LogbookLayer::new(logger(&sink)).layer(service_fn(echo));

        let mut request = get("http://localhost/greet");
        request
            .extensions_mut()
            .insert("10.0.0.7:5000".parse::<SocketAddr>().unwrap());
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&read(response).await[..], b"Hello, world!");

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].correlation, records[1].correlation);
        assert!(records[0].text.starts_with("Incoming Request:"));
        assert!(records[0].text.contains("Remote: 10.0.0.7"));
        assert!(records[1].text.starts_with("Outgoing Response:"));
        assert!(records[1].text.contains("HTTP/1.1 200 OK"));
        assert!(records[1].text.ends_with("Hello, world!"));
    }

    #[tokio::test]
    async fn test_response_written_only_when_body_completes() {
        let sink = RecordingSink::new();
        let service = LogbookLayer::new(logger(&sink)).layer(service_fn(echo));

        let response = service.oneshot(get("/")).await.unwrap();
        assert_eq!(sink.request_count(), 1);
        assert_eq!(sink.response_count(), 0);

        read(response).await;
        assert_eq!(sink.response_count(), 1);
    }

    #[tokio::test]
    async fn test_request_body_reaches_service_unchanged() {
        let sink = RecordingSink::new();
        let service = LogbookLayer::new(logger(&sink)).layer(service_fn(echo));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header("Content-Type", "application/json")
            .body(body::full(r#"{"password":"p","access_token":"t"}"#))
            .unwrap();
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(
            &read(response).await[..],
            br#"{"password":"p","access_token":"t"}"#
        );

        let records = sink.records();
        assert!(records[0].text.ends_with(r#"{"password":"p","access_token":"XXX"}"#));
    }

    #[tokio::test]
    async fn test_bodies_beyond_capture_limit() {
        let sink = RecordingSink::new();
        let service = LogbookLayer::new(logger(&sink))
            .capture_limit(4)
            .layer(service_fn(echo));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header("Content-Type", "text/plain")
            .body(body::full("abcdefgh"))
            .unwrap();
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(&read(response).await[..], b"abcdefgh");

        let records = sink.records();
        assert!(records[0].text.ends_with("\n\nabcd..."));
        assert!(records[1].text.ends_with("\n\nabcd..."));
    }

    #[tokio::test]
    async fn test_form_parameter_mode() {
        let sink = RecordingSink::new();
        let service = LogbookLayer::new(logger(&sink))
            .form_request_mode(FormRequestMode::Parameter)
            .layer(service_fn(echo));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body::full("user=a%20b&password=secret"))
            .unwrap();
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(&read(response).await[..], b"user=a%20b&password=secret");
        assert!(sink.records()[0].text.ends_with("user=a+b&password=XXX"));
    }

    #[tokio::test]
    async fn test_multipart_is_streamed() {
        let sink = RecordingSink::new();
        let service = LogbookLayer::new(logger(&sink)).layer(service_fn(echo));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header("Content-Type", "multipart/form-data; boundary=b")
            .body(body::full("--b\r\n\r\nfile\r\n--b--"))
            .unwrap();
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(&read(response).await[..], b"--b\r\n\r\nfile\r\n--b--");
        assert!(sink.records()[0].text.ends_with("<multipart>"));
    }

    #[tokio::test]
    async fn test_twice_notified_writes_once() {
        let sink = RecordingSink::new();
        let service = LogbookLayer::new(logger(&sink)).layer(service_fn(echo));

        let response = service.oneshot(get("/")).await.unwrap();
        let mut body = response.into_body();
        while let Some(frame) = body.frame().await {
            frame.unwrap();
        }
        // end of stream was observed; dropping the body notifies again
        drop(body);
        assert_eq!(sink.response_count(), 1);
    }

    #[tokio::test]
    async fn test_resumed_dispatch_is_not_logged_again() {
        let sink = RecordingSink::new();
        let seen = Arc::new(Mutex::new(None::<ExchangeSlots>));
        let recorder = seen.clone();
        let inner = service_fn(move |request: Request<BoxBody>| {
            let recorder = recorder.clone();
            async move {
                *recorder.lock().unwrap() = request.extensions().get::<ExchangeSlots>().cloned();
                echo(request).await
            }
        });
        let service = LogbookLayer::new(logger(&sink)).layer(inner);

        let response = service.clone().oneshot(get("/async")).await.unwrap();
        let slots = seen.lock().unwrap().clone().unwrap();
        assert_eq!(slots.len(), 1);

        let mut resumed = get("/async");
        resumed.extensions_mut().insert(slots);
        let second = service.oneshot(resumed).await.unwrap();
        read(second).await;
        assert_eq!(sink.request_count(), 1);
        assert_eq!(sink.response_count(), 0);

        read(response).await;
        assert_eq!(sink.request_count(), 1);
        assert_eq!(sink.response_count(), 1);
    }

    #[tokio::test]
    async fn test_resumed_dispatch_without_stage() {
        let sink = RecordingSink::new();
        let layer = LogbookLayer::new(logger(&sink));
        let mut slots = ExchangeSlots::default();
        slots.insert(layer.owner, Arc::new(Exchange::new()));

        let mut request = get("/");
        request.extensions_mut().insert(slots);
        let response = layer.layer(service_fn(echo)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        read(response).await;
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_two_layers_keep_separate_exchanges() {
        let outer_sink = RecordingSink::new();
        let inner_sink = RecordingSink::new();
        let service = LogbookLayer::new(logger(&outer_sink))
            .layer(LogbookLayer::new(logger(&inner_sink)).layer(service_fn(echo)));

        let response = service.oneshot(get("/")).await.unwrap();
        read(response).await;
        assert_eq!(outer_sink.records().len(), 2);
        assert_eq!(inner_sink.records().len(), 2);
    }

    #[tokio::test]
    async fn test_body_error_still_logs_response() {
        let sink = RecordingSink::new();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = errors.clone();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .on_error(move |err| seen.lock().unwrap().push(err.to_string()))
            .build();
        let inner = service_fn(|_: Request<BoxBody>| async {
            Ok::<_, Infallible>(Response::new(body::failed("upstream reset")))
        });
        let service = LogbookLayer::new(logger).layer(inner);

        let response = service.oneshot(get("/")).await.unwrap();
        let err = response.into_body().collect().await.unwrap_err();
        assert_eq!(err.to_string(), "upstream reset");

        assert_eq!(sink.response_count(), 1);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("upstream reset"));
    }

    #[tokio::test]
    async fn test_inactive_sink_passes_through() {
        let sink = RecordingSink::new();
        sink.set_active(false);
        let service = LogbookLayer::new(logger(&sink)).layer(service_fn(echo));

        let response = service.oneshot(get("/")).await.unwrap();
        assert!(!response.body().is_capturing());
        assert_eq!(&read(response).await[..], b"Hello, world!");
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_declined_exchange_is_unaffected() {
        let sink = RecordingSink::new();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .strategy(TestStrategy::new("id").skip_all())
            .build();
        let service = LogbookLayer::new(logger).layer(service_fn(echo));

        let response = service.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&read(response).await[..], b"Hello, world!");
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_request_sink_failure_keeps_response() {
        let sink = RecordingSink::new();
        sink.fail_requests(true);
        let phases = Arc::new(Mutex::new(Vec::new()));
        let seen = phases.clone();
        let logger = HttpLogger::builder()
            .sink(sink.clone())
            .on_error(move |err: &LogError| seen.lock().unwrap().push(err.phase()))
            .build();
        let service = LogbookLayer::new(logger).layer(service_fn(echo));

        let response = service.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        read(response).await;

        assert_eq!(sink.request_count(), 0);
        assert_eq!(sink.response_count(), 1);
        assert_eq!(*phases.lock().unwrap(), vec![Some(Phase::Request)]);
    }
}
