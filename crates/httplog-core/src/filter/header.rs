//! Header filters

use super::{lowercase_all, FilterChain, REDACTED};
use crate::headers::HttpHeaders;
use std::sync::Arc;

/// Rewrites the headers of a message
pub trait HeaderFilter: Send + Sync + 'static {
    /// Return the filtered headers
    fn filter(&self, headers: HttpHeaders) -> HttpHeaders;

    /// Combine with `next`, which sees this filter's output
    fn merge<N: HeaderFilter>(self, next: N) -> FilterChain<dyn HeaderFilter>
    where
        Self: Sized,
    {
        FilterChain::<dyn HeaderFilter>::new().then(self).then(next)
    }
}

impl<F> HeaderFilter for F
where
    F: Fn(HttpHeaders) -> HttpHeaders + Send + Sync + 'static,
{
    fn filter(&self, headers: HttpHeaders) -> HttpHeaders {
        self(headers)
    }
}

impl FilterChain<dyn HeaderFilter> {
    /// Append a filter to the chain
    pub fn then(self, filter: impl HeaderFilter) -> Self {
        self.then_shared(Arc::new(filter))
    }
}

impl HeaderFilter for FilterChain<dyn HeaderFilter> {
    fn filter(&self, headers: HttpHeaders) -> HttpHeaders {
        self.iter().fold(headers, |headers, filter| filter.filter(headers))
    }
}

/// Leaves headers unchanged
pub fn none() -> impl HeaderFilter {
    |headers: HttpHeaders| headers
}

/// The built-in header filter: [`authorization`]
pub fn default_value() -> impl HeaderFilter {
    authorization()
}

/// Masks credentials sent in `Authorization` and `Proxy-Authorization`
pub fn authorization() -> impl HeaderFilter {
    replace_headers(["Authorization", "Proxy-Authorization"], REDACTED)
}

/// Replace every value of the named headers, keeping the header names
pub fn replace_headers<I, S>(names: I, replacement: impl Into<String>) -> impl HeaderFilter
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names = lowercase_all(names);
    replace_headers_by(move |name: &str| names.contains(&name.to_ascii_lowercase()), replacement)
}

/// Replace every value of the headers whose name matches the predicate
pub fn replace_headers_by<P>(predicate: P, replacement: impl Into<String>) -> impl HeaderFilter
where
    P: Fn(&str) -> bool + Send + Sync + 'static,
{
    let replacement = replacement.into();
    move |headers: HttpHeaders| {
        headers.map_values(|name, value| {
            if predicate(name) {
                replacement.clone()
            } else {
                value.to_string()
            }
        })
    }
}

/// Drop the named headers entirely
pub fn remove_headers<I, S>(names: I) -> impl HeaderFilter
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names = lowercase_all(names);
    move |mut headers: HttpHeaders| {
        headers.retain(|name, _| !names.contains(&name.to_ascii_lowercase()));
        headers
    }
}

/// Rewrite each header value with a function of its name and value
pub fn each_header<F>(f: F) -> impl HeaderFilter
where
    F: Fn(&str, &str) -> String + Send + Sync + 'static,
{
    move |headers: HttpHeaders| headers.map_values(|name, value| f(name, value))
}

/// Mask the values of the named cookies in `Cookie` and `Set-Cookie`
pub fn replace_cookies<I, S>(cookies: I, replacement: impl Into<String>) -> impl HeaderFilter
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let cookies: Vec<String> = cookies.into_iter().map(|c| c.as_ref().to_string()).collect();
    let replacement = replacement.into();
    move |headers: HttpHeaders| {
        headers.map_values(|name, value| {
            if name.eq_ignore_ascii_case("cookie") {
                value
                    .split(';')
                    .map(|pair| mask_cookie(pair.trim(), &cookies, &replacement))
                    .collect::<Vec<_>>()
                    .join("; ")
            } else if name.eq_ignore_ascii_case("set-cookie") {
                match value.split_once(';') {
                    Some((pair, attributes)) => {
                        format!("{};{}", mask_cookie(pair, &cookies, &replacement), attributes)
                    }
                    None => mask_cookie(value, &cookies, &replacement),
                }
            } else {
                value.to_string()
            }
        })
    }
}

fn mask_cookie(pair: &str, cookies: &[String], replacement: &str) -> String {
    match pair.split_once('=') {
        Some((name, _)) if cookies.iter().any(|c| c == name.trim()) => {
            format!("{}={}", name, replacement)
        }
        _ => pair.to_string(),
    }
}
