//! Filters rewrite messages before they are formatted
//!
//! There is one trait per axis a filter works on:
//!
//! | Trait | Rewrites |
//! |-------|----------|
//! | [`HeaderFilter`] | header names and values |
//! | [`QueryFilter`] | the raw query string |
//! | [`PathFilter`] | the request path |
//! | [`BodyFilter`] | the body text, given its content type |
//! | [`RequestFilter`] | a whole [`HttpRequest`](crate::HttpRequest) |
//! | [`ResponseFilter`] | a whole [`HttpResponse`](crate::HttpResponse) |
//! | [`BodyReplacer`] | substitutes a fixed text for a body it cannot render |
//!
//! Every trait is implemented for plain closures, and every filter can be
//! merged with another filter of the same kind. A merged filter applies its
//! parts left to right; an empty [`FilterChain`] is the identity.
//!
//! # Example
//!
//! ```rust,ignore
//! use httplog_core::filter::{header, query, HeaderFilter};
//!
//! let headers = header::authorization()
//!     .merge(header::replace_headers(["X-Api-Key"], "XXX"));
//! let query = query::replace_query(["password"], "XXX");
//! ```

pub mod body;
pub mod header;
pub mod path;
pub mod query;
pub mod replacer;
pub mod request;
pub mod response;

pub use body::BodyFilter;
pub use header::HeaderFilter;
pub use path::PathFilter;
pub use query::QueryFilter;
pub use replacer::{BodyReplacer, ReplacerChain};
pub use request::RequestFilter;
pub use response::ResponseFilter;

use std::fmt;
use std::sync::Arc;

/// Marker that replaces redacted values
pub const REDACTED: &str = "XXX";

/// An ordered sequence of filters of one kind.
///
/// Applying the chain folds each filter over the message, first to last.
pub struct FilterChain<F: ?Sized> {
    filters: Vec<Arc<F>>,
}

impl<F: ?Sized> FilterChain<F> {
    /// Create an empty chain, which leaves every message unchanged
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Append an already shared filter
    pub fn then_shared(mut self, filter: Arc<F>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Append every filter of another chain
    pub fn extend(mut self, other: FilterChain<F>) -> Self {
        self.filters.extend(other.filters);
        self
    }

    /// Number of filters in the chain
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<F>> {
        self.filters.iter()
    }
}

impl<F: ?Sized> Default for FilterChain<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> Clone for FilterChain<F> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for FilterChain<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("len", &self.filters.len())
            .finish()
    }
}

/// The media type of a `Content-Type` value, lowercased and without parameters
pub(crate) fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Check a `Content-Type` against patterns such as `image/*`
pub(crate) fn matches_media_type(content_type: &str, patterns: &[String]) -> bool {
    let media = media_type(content_type);
    patterns.iter().any(|pattern| match pattern.strip_suffix("/*") {
        Some(prefix) => media
            .split_once('/')
            .map(|(kind, _)| kind == prefix)
            .unwrap_or(false),
        None => media == *pattern,
    })
}

pub(crate) fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .map(media_type)
        .map(|media| media == "application/json" || media.ends_with("+json"))
        .unwrap_or(false)
}

pub(crate) fn is_form(content_type: Option<&str>) -> bool {
    content_type
        .map(media_type)
        .map(|media| media == "application/x-www-form-urlencoded")
        .unwrap_or(false)
}

pub(crate) fn lowercase_all<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().to_ascii_lowercase())
        .collect()
}

/// Rewrite `name=value` pairs separated by `&` without decoding them.
///
/// The callback returns `None` to drop a pair. Pairs it returns unchanged are
/// reproduced byte for byte.
pub(crate) fn rewrite_pairs(
    input: &str,
    mut f: impl FnMut(&str, Option<&str>) -> Option<String>,
) -> String {
    if input.is_empty() {
        return String::new();
    }
    input
        .split('&')
        .filter_map(|pair| match pair.split_once('=') {
            Some((name, value)) => f(name, Some(value)),
            None => f(pair, None),
        })
        .collect::<Vec<_>>()
        .join("&")
}
