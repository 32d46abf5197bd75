//! Request filters
//!
//! Request filters see the whole [`HttpRequest`] view. The adapters in this
//! module lift the narrower header, query, path and body filters to requests.

use super::{BodyFilter, BodyReplacer, FilterChain, HeaderFilter, PathFilter, QueryFilter};
use crate::filter::replacer;
use crate::message::{HttpMessage, HttpRequest};
use std::sync::Arc;

/// Rewrites a request view
pub trait RequestFilter: Send + Sync + 'static {
    /// Return the filtered request
    fn filter(&self, request: HttpRequest) -> HttpRequest;

    /// Combine with `next`, which sees this filter's output
    fn merge<N: RequestFilter>(self, next: N) -> FilterChain<dyn RequestFilter>
    where
        Self: Sized,
    {
        FilterChain::<dyn RequestFilter>::new().then(self).then(next)
    }
}

impl<F> RequestFilter for F
where
    F: Fn(HttpRequest) -> HttpRequest + Send + Sync + 'static,
{
    fn filter(&self, request: HttpRequest) -> HttpRequest {
        self(request)
    }
}

impl FilterChain<dyn RequestFilter> {
    /// Append a filter to the chain
    pub fn then(self, filter: impl RequestFilter) -> Self {
        self.then_shared(Arc::new(filter))
    }
}

impl RequestFilter for FilterChain<dyn RequestFilter> {
    fn filter(&self, request: HttpRequest) -> HttpRequest {
        self.iter()
            .fold(request, |request, filter| filter.filter(request))
    }
}

/// Leaves the request unchanged
pub fn none() -> impl RequestFilter {
    |request: HttpRequest| request
}

/// Swap the body for the replacer's text when it returns one
pub fn replace_body(replacer: impl BodyReplacer<HttpRequest>) -> impl RequestFilter {
    move |request: HttpRequest| match replacer.replace(&request) {
        Some(body) => request.with_replaced_body(body),
        None => request,
    }
}

/// The built-in request filter: the default body replacers
pub fn default_value() -> impl RequestFilter {
    replace_body(replacer::default_value::<HttpRequest>())
}

/// Reduce a list of default filters onto the [`default_value`] baseline
pub fn default_with<I>(defaults: I) -> FilterChain<dyn RequestFilter>
where
    I: IntoIterator<Item = Arc<dyn RequestFilter>>,
{
    let baseline = FilterChain::<dyn RequestFilter>::new().then(default_value());
    defaults
        .into_iter()
        .fold(baseline, FilterChain::then_shared)
}

/// Apply a header filter to the request headers
pub fn headers(filter: impl HeaderFilter) -> impl RequestFilter {
    move |request: HttpRequest| {
        let headers = filter.filter(request.headers().clone());
        request.with_headers(headers)
    }
}

/// Apply a query filter to the query string
pub fn query(filter: impl QueryFilter) -> impl RequestFilter {
    move |request: HttpRequest| {
        if request.query().is_empty() {
            return request;
        }
        let query = filter.filter(request.query());
        request.with_query(query)
    }
}

/// Apply a path filter to the path
pub fn path(filter: impl PathFilter) -> impl RequestFilter {
    move |request: HttpRequest| {
        let path = filter.filter(request.path());
        request.with_path(path)
    }
}

/// Apply a body filter to UTF-8 bodies; other bodies are left alone
pub fn body(filter: impl BodyFilter) -> impl RequestFilter {
    move |request: HttpRequest| {
        if request.is_body_replaced() {
            return request;
        }
        let filtered = match std::str::from_utf8(request.body()) {
            Ok(text) if !text.is_empty() => {
                let filtered = filter.filter(request.content_type(), text);
                (filtered != text).then_some(filtered)
            }
            _ => None,
        };
        match filtered {
            Some(body) => request.with_body_text(body),
            None => request,
        }
    }
}
