//! # httplog Server
//!
//! Tower middleware that logs the requests a service receives and the
//! responses it sends.
//!
//! Requests are buffered before dispatch so their bodies can be logged and
//! still reach the service unchanged. Responses are logged once their body
//! has been streamed to the client, so the logged duration covers the whole
//! exchange.
//!
//! This crate is not meant to be used directly. Use `httplog` instead.

mod form;
mod layer;

pub use layer::{LogbookLayer, LogbookService, DEFAULT_CAPTURE_LIMIT};
