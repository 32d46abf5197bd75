//! # httplog Client
//!
//! Tower middleware that logs the requests a client sends and the responses
//! it receives.
//!
//! Wrap any `tower::Service` that issues HTTP requests. The request record
//! is written before the request leaves; the response record once the
//! caller has read the response body.
//!
//! ```rust,ignore
//! use httplog_client::LogbookClientLayer;
//! use tower::ServiceBuilder;
//!
//! let client = ServiceBuilder::new()
//!     .layer(LogbookClientLayer::new(logger))
//!     .service(http_client);
//! ```
//!
//! This crate is not meant to be used directly. Use `httplog` instead.

mod layer;

pub use layer::{LogbookClient, LogbookClientLayer, DEFAULT_CAPTURE_LIMIT};
