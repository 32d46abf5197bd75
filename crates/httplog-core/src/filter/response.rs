//! Response filters

use super::{BodyFilter, BodyReplacer, FilterChain, HeaderFilter};
use crate::filter::replacer;
use crate::message::{HttpMessage, HttpResponse};
use std::sync::Arc;

/// Rewrites a response view
pub trait ResponseFilter: Send + Sync + 'static {
    /// Return the filtered response
    fn filter(&self, response: HttpResponse) -> HttpResponse;

    /// Combine with `next`, which sees this filter's output
    fn merge<N: ResponseFilter>(self, next: N) -> FilterChain<dyn ResponseFilter>
    where
        Self: Sized,
    {
        FilterChain::<dyn ResponseFilter>::new().then(self).then(next)
    }
}

impl<F> ResponseFilter for F
where
    F: Fn(HttpResponse) -> HttpResponse + Send + Sync + 'static,
{
    fn filter(&self, response: HttpResponse) -> HttpResponse {
        self(response)
    }
}

impl FilterChain<dyn ResponseFilter> {
    /// Append a filter to the chain
    pub fn then(self, filter: impl ResponseFilter) -> Self {
        self.then_shared(Arc::new(filter))
    }
}

impl ResponseFilter for FilterChain<dyn ResponseFilter> {
    fn filter(&self, response: HttpResponse) -> HttpResponse {
        self.iter()
            .fold(response, |response, filter| filter.filter(response))
    }
}

/// Leaves the response unchanged
pub fn none() -> impl ResponseFilter {
    |response: HttpResponse| response
}

/// Swap the body for the replacer's text when it returns one
pub fn replace_body(replacer: impl BodyReplacer<HttpResponse>) -> impl ResponseFilter {
    move |response: HttpResponse| match replacer.replace(&response) {
        Some(body) => response.with_replaced_body(body),
        None => response,
    }
}

/// The built-in response filter: the default body replacers
pub fn default_value() -> impl ResponseFilter {
    replace_body(replacer::default_value::<HttpResponse>())
}

/// Reduce a list of default filters onto the [`default_value`] baseline
pub fn default_with<I>(defaults: I) -> FilterChain<dyn ResponseFilter>
where
    I: IntoIterator<Item = Arc<dyn ResponseFilter>>,
{
    let baseline = FilterChain::<dyn ResponseFilter>::new().then(default_value());
    defaults
        .into_iter()
        .fold(baseline, FilterChain::then_shared)
}

/// Apply a header filter to the response headers
pub fn headers(filter: impl HeaderFilter) -> impl ResponseFilter {
    move |response: HttpResponse| {
        let headers = filter.filter(response.headers().clone());
        response.with_headers(headers)
    }
}

/// Apply a body filter to UTF-8 bodies; other bodies are left alone
pub fn body(filter: impl BodyFilter) -> impl ResponseFilter {
    move |response: HttpResponse| {
        if response.is_body_replaced() {
            return response;
        }
        let filtered = match std::str::from_utf8(response.body()) {
            Ok(text) if !text.is_empty() => {
                let filtered = filter.filter(response.content_type(), text);
                (filtered != text).then_some(filtered)
            }
            _ => None,
        };
        match filtered {
            Some(body) => response.with_body_text(body),
            None => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{body as bodies, header, replacer};
    use crate::message::Origin;
    use http::StatusCode;

    fn response(content_type: &str, body: &'static str) -> HttpResponse {
        HttpResponse::new(Origin::Local, StatusCode::OK)
            .with_headers([("Content-Type", content_type)].into_iter().collect())
            .with_body(body)
    }

    #[test]
    fn test_default_replaces_streams() {
        let filtered = default_value().filter(response("text/event-stream", "data: 1\n\n"));
        assert_eq!(filtered.body_as_string(), "<stream>");
    }

    #[test]
    fn test_text_body_kept() {
        let res = response("text/plain", "Hello, world!");
        assert_eq!(default_value().filter(res.clone()), res);
    }

    #[test]
    fn test_custom_replacer() {
        let filter = replace_body(replacer::content_type::<HttpResponse, _, _>(
            ["application/xml"],
            "<xml>",
        ));
        let filtered = filter.filter(response("application/xml", "<a/>"));
        assert_eq!(filtered.body_as_string(), "<xml>");
    }

    #[test]
    fn test_body_filters_skip_replaced_bodies() {
        let filter = default_value().merge(body(bodies::truncate(3)));
        let filtered = filter.filter(response("image/png", "not really a png"));
        assert_eq!(filtered.body_as_string(), "<binary>");
        assert!(filtered.is_body_replaced());

        let filtered = filter.filter(response("text/plain", "plain text"));
        assert_eq!(filtered.body_as_string(), "pla...");
        assert!(!filtered.is_body_replaced());
    }

    #[test]
    fn test_lifted_filters() {
        let res = HttpResponse::new(Origin::Remote, StatusCode::OK)
            .with_headers(
                [
                    ("Proxy-Authorization", "Basic x"),
                    ("Content-Type", "application/json"),
                ]
                .into_iter()
                .collect(),
            )
            .with_body(r#"{"refresh_token":"r","ok":true}"#);
        let filter = headers(header::default_value()).merge(body(bodies::default_value()));
        let filtered = filter.filter(res);
        assert_eq!(filtered.headers().first("proxy-authorization"), Some("XXX"));
        assert_eq!(filtered.body_as_string(), r#"{"refresh_token":"XXX","ok":true}"#);
    }
}
