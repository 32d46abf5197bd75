//! Body replacers
//!
//! A replacer decides whether a body should be logged at all. Returning
//! `Some(text)` swaps the whole body for `text`, returning `None` keeps it.
//! Replacers are consulted before any body filter sees the body.

use super::{lowercase_all, matches_media_type};
use crate::message::HttpMessage;
use std::fmt;
use std::sync::Arc;

/// Substitutes a fixed text for a body that should not be logged verbatim
pub trait BodyReplacer<M>: Send + Sync + 'static {
    /// The replacement body, or `None` to keep the body
    fn replace(&self, message: &M) -> Option<String>;

    /// Fall back to `next` when this replacer keeps the body
    fn or<N: BodyReplacer<M>>(self, next: N) -> ReplacerChain<M>
    where
        Self: Sized,
        M: 'static,
    {
        ReplacerChain::new().then(self).then(next)
    }
}

impl<M, F> BodyReplacer<M> for F
where
    F: Fn(&M) -> Option<String> + Send + Sync + 'static,
{
    fn replace(&self, message: &M) -> Option<String> {
        self(message)
    }
}

/// Replacers consulted in order; the first one returning a body wins
pub struct ReplacerChain<M> {
    replacers: Vec<Arc<dyn BodyReplacer<M>>>,
}

impl<M: 'static> ReplacerChain<M> {
    /// A chain that never replaces
    pub fn new() -> Self {
        Self {
            replacers: Vec::new(),
        }
    }

    /// Append a replacer
    pub fn then(mut self, replacer: impl BodyReplacer<M>) -> Self {
        self.replacers.push(Arc::new(replacer));
        self
    }
}

impl<M: 'static> Default for ReplacerChain<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for ReplacerChain<M> {
    fn clone(&self) -> Self {
        Self {
            replacers: self.replacers.clone(),
        }
    }
}

impl<M> fmt::Debug for ReplacerChain<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplacerChain")
            .field("len", &self.replacers.len())
            .finish()
    }
}

impl<M: 'static> BodyReplacer<M> for ReplacerChain<M> {
    fn replace(&self, message: &M) -> Option<String> {
        self.replacers.iter().find_map(|r| r.replace(message))
    }
}

/// Content types rendered as `<binary>`
pub const BINARY_TYPES: &[&str] = &[
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/x-protobuf",
    "application/protobuf",
    "application/grpc",
    "image/*",
    "audio/*",
    "video/*",
    "font/*",
];

/// Content types rendered as `<multipart>`
pub const MULTIPART_TYPES: &[&str] = &["multipart/*"];

/// Content types rendered as `<stream>`
pub const STREAM_TYPES: &[&str] = &[
    "text/event-stream",
    "application/x-ndjson",
    "application/stream+json",
    "application/x-json-stream",
];

/// Replace binary bodies with `<binary>`
pub fn binary<M: HttpMessage + 'static>() -> impl BodyReplacer<M> {
    content_type(BINARY_TYPES.iter().copied(), "<binary>")
}

/// Replace multipart bodies with `<multipart>`
pub fn multipart<M: HttpMessage + 'static>() -> impl BodyReplacer<M> {
    content_type(MULTIPART_TYPES.iter().copied(), "<multipart>")
}

/// Replace streaming bodies with `<stream>`
pub fn stream<M: HttpMessage + 'static>() -> impl BodyReplacer<M> {
    content_type(STREAM_TYPES.iter().copied(), "<stream>")
}

/// Replace bodies whose content type matches one of `types`.
///
/// Types may end in `/*` to match a whole family. Messages without a content
/// type are kept.
pub fn content_type<M, I, S>(types: I, replacement: impl Into<String>) -> impl BodyReplacer<M>
where
    M: HttpMessage + 'static,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let types = lowercase_all(types);
    let replacement = replacement.into();
    move |message: &M| {
        message
            .content_type()
            .filter(|content_type| matches_media_type(content_type, &types))
            .map(|_| replacement.clone())
    }
}

/// Replace bodies of messages matching the predicate
pub fn replace_by<M, P>(predicate: P, replacement: impl Into<String>) -> impl BodyReplacer<M>
where
    M: 'static,
    P: Fn(&M) -> bool + Send + Sync + 'static,
{
    let replacement = replacement.into();
    move |message: &M| predicate(message).then(|| replacement.clone())
}

/// The built-in replacers: binary, then multipart, then stream
pub fn default_value<M: HttpMessage + 'static>() -> ReplacerChain<M> {
    binary::<M>().or(multipart::<M>()).or(stream::<M>())
}
