//! Query string filters
//!
//! Query filters see the raw, still percent-encoded query string. Pairs that
//! a filter does not touch are reproduced exactly.

use super::{rewrite_pairs, FilterChain, REDACTED};
use std::sync::Arc;

/// Rewrites the query string of a request
pub trait QueryFilter: Send + Sync + 'static {
    /// Return the filtered query string
    fn filter(&self, query: &str) -> String;

    /// Combine with `next`, which sees this filter's output
    fn merge<N: QueryFilter>(self, next: N) -> FilterChain<dyn QueryFilter>
    where
        Self: Sized,
    {
        FilterChain::<dyn QueryFilter>::new().then(self).then(next)
    }
}

impl<F> QueryFilter for F
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    fn filter(&self, query: &str) -> String {
        self(query)
    }
}

impl FilterChain<dyn QueryFilter> {
    /// Append a filter to the chain
    pub fn then(self, filter: impl QueryFilter) -> Self {
        self.then_shared(Arc::new(filter))
    }
}

impl QueryFilter for FilterChain<dyn QueryFilter> {
    fn filter(&self, query: &str) -> String {
        self.iter()
            .fold(query.to_string(), |query, filter| filter.filter(&query))
    }
}

/// Leaves the query unchanged
pub fn none() -> impl QueryFilter {
    |query: &str| query.to_string()
}

/// The built-in query filter: [`access_token`]
pub fn default_value() -> impl QueryFilter {
    access_token()
}

/// Masks an `access_token` parameter
pub fn access_token() -> impl QueryFilter {
    replace_query(["access_token"], REDACTED)
}

/// Replace the values of the named parameters
pub fn replace_query<I, S>(names: I, replacement: impl Into<String>) -> impl QueryFilter
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
    let replacement = replacement.into();
    move |query: &str| {
        rewrite_pairs(query, |name, value| {
            Some(match value {
                Some(_) if names.iter().any(|n| n == name) => {
                    format!("{}={}", name, replacement)
                }
                Some(value) => format!("{}={}", name, value),
                None => name.to_string(),
            })
        })
    }
}

/// Drop the named parameters
pub fn remove_query<I, S>(names: I) -> impl QueryFilter
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
    move |query: &str| {
        rewrite_pairs(query, |name, value| {
            if names.iter().any(|n| n == name) {
                return None;
            }
            Some(match value {
                Some(value) => format!("{}={}", name, value),
                None => name.to_string(),
            })
        })
    }
}
