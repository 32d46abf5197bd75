//! The client-side logging layer

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Request, Response};
use http_body::Body;
use httplog_core::body::{self, BoxBody, CapturedBody};
use httplog_core::{
    BoxError, ConfigError, Exchange, HttpLogger, HttpRequest, HttpResponse, LogbookConfig, Origin,
};
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Default number of body bytes kept for logging: 1MB
pub const DEFAULT_CAPTURE_LIMIT: usize = 1024 * 1024;

/// Layer that logs requests sent through a client service
#[derive(Clone, Debug)]
pub struct LogbookClientLayer {
    logger: HttpLogger,
    capture_limit: usize,
}

impl LogbookClientLayer {
    /// Create a layer logging through `logger`
    pub fn new(logger: HttpLogger) -> Self {
        Self {
            logger,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
        }
    }

    /// Create a layer from settings
    pub fn from_config(config: &LogbookConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(HttpLogger::from_config(config)?))
    }

    /// Keep at most `limit` body bytes of each message for logging
    pub fn capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = limit;
        self
    }
}

impl<S> Layer<S> for LogbookClientLayer {
    type Service = LogbookClient<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LogbookClient {
            inner,
            logger: self.logger.clone(),
            capture_limit: self.capture_limit,
        }
    }
}

/// Client service produced by [`LogbookClientLayer`]
#[derive(Clone, Debug)]
pub struct LogbookClient<S> {
    inner: S,
    logger: HttpLogger,
    capture_limit: usize,
}

impl<S> LogbookClient<S> {
    /// Get a reference to the wrapped client
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("multipart/"))
        .unwrap_or(false)
}

impl<S, F, ReqBody, ResBody> Service<Request<ReqBody>> for LogbookClient<S>
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
        let logger = self.logger.clone();
        let capture_limit = self.capture_limit;

        Box::pin(async move {
            let (parts, body) = request.into_parts();

            if !logger.is_active() {
                let response = inner.call(Request::from_parts(parts, body::boxed(body))).await?;
                return Ok(response.map(CapturedBody::passthrough));
            }

            let (logged, forwarded) = if is_multipart(&parts.headers) {
                (Bytes::new(), body::boxed(body))
            } else {
                let buffered = body::buffer(body, capture_limit).await;
                (buffered.logged_body(), buffered.forwarded)
            };
            let remote = parts.uri.host().unwrap_or_default().to_string();
            let view = HttpRequest::from_parts(Origin::Local, &parts, logged).with_remote(remote);

            let exchange = Arc::new(Exchange::new());
            let skipped = exchange.begin(|| logger.process(view).write()).is_noop();

            let response = inner.call(Request::from_parts(parts, forwarded)).await?;
            if skipped {
                tracing::debug!("exchange declined, response not captured");
                return Ok(response.map(CapturedBody::passthrough));
            }
            let (parts, body) = response.into_parts();
            let head = HttpResponse::from_parts(Origin::Remote, &parts, Bytes::new());
            let body = CapturedBody::new(body, capture_limit, exchange.completion(logger, head));
            Ok(Response::from_parts(parts, body))
        })
    }
}
