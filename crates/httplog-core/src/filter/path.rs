//! Path filters
//!
//! Besides arbitrary closures, paths can be masked against a template such as
//! `/users/{id}/tokens/{token}`. Segments matching a `{variable}` or `*` are
//! replaced, literal segments must match exactly.

use super::FilterChain;
use std::sync::Arc;

/// Rewrites the path of a request
pub trait PathFilter: Send + Sync + 'static {
    /// Return the filtered path
    fn filter(&self, path: &str) -> String;

    /// Combine with `next`, which sees this filter's output
    fn merge<N: PathFilter>(self, next: N) -> FilterChain<dyn PathFilter>
    where
        Self: Sized,
    {
        FilterChain::<dyn PathFilter>::new().then(self).then(next)
    }
}

impl<F> PathFilter for F
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    fn filter(&self, path: &str) -> String {
        self(path)
    }
}

impl FilterChain<dyn PathFilter> {
    /// Append a filter to the chain
    pub fn then(self, filter: impl PathFilter) -> Self {
        self.then_shared(Arc::new(filter))
    }
}

impl PathFilter for FilterChain<dyn PathFilter> {
    fn filter(&self, path: &str) -> String {
        self.iter()
            .fold(path.to_string(), |path, filter| filter.filter(&path))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Variable,
}

/// A path template with `{variable}` segments
#[derive(Debug, Clone)]
struct Template {
    segments: Vec<Segment>,
}

impl Template {
    fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(|segment| {
                if segment == "*"
                    || (segment.starts_with('{') && segment.ends_with('}') && segment.len() >= 2)
                {
                    Segment::Variable
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    fn apply(&self, path: &str, replace: impl Fn(&str) -> String) -> Option<String> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut out = Vec::with_capacity(parts.len());
        for (part, segment) in parts.iter().zip(&self.segments) {
            match segment {
                Segment::Literal(literal) if literal == part => out.push(part.to_string()),
                Segment::Literal(_) => return None,
                Segment::Variable => out.push(replace(part)),
            }
        }
        Some(out.join("/"))
    }
}

/// Leaves the path unchanged
pub fn none() -> impl PathFilter {
    |path: &str| path.to_string()
}

/// Replace the variable segments of paths matching `pattern`
pub fn replace(replacement: impl Into<String>, pattern: &str) -> impl PathFilter {
    let template = Template::parse(pattern);
    let replacement = replacement.into();
    move |path: &str| {
        template
            .apply(path, |_| replacement.clone())
            .unwrap_or_else(|| path.to_string())
    }
}

/// Replace the variable segments of matching paths with their `{name}`.
///
/// `/users/42` filtered with `/users/{id}` becomes `/users/{id}`.
pub fn template(pattern: &str) -> impl PathFilter {
    let pattern = pattern.to_string();
    let template = Template::parse(&pattern);
    move |path: &str| {
        if template.apply(path, str::to_string).is_some() {
            pattern.clone()
        } else {
            path.to_string()
        }
    }
}

/// Replace every segment matching the predicate, regardless of position
pub fn replace_segments<P>(predicate: P, replacement: impl Into<String>) -> impl PathFilter
where
    P: Fn(&str) -> bool + Send + Sync + 'static,
{
    let replacement = replacement.into();
    move |path: &str| {
        path.split('/')
            .map(|segment| {
                if !segment.is_empty() && predicate(segment) {
                    replacement.as_str()
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}
