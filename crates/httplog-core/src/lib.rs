//! # httplog Core
//!
//! Core library providing HTTP message views, filters, strategies,
//! formatters, sinks and the staged request/response logging pipeline.
//!
//! Host adapters (see `httplog-server` and `httplog-client`) turn their
//! native requests and responses into [`HttpRequest`] and [`HttpResponse`]
//! views and drive an [`HttpLogger`] through its stages:
//!
//! ```rust,ignore
//! let processing = logger.process(request).write();
//! // the response may be produced later, on another thread
//! processing.process(response).write();
//! ```
//!
//! This crate is not meant to be used directly. Use `httplog` instead.

pub mod body;
pub mod config;
mod correlation;
mod error;
pub mod exchange;
pub mod filter;
pub mod formatter;
mod headers;
mod logger;
mod message;
mod sink;
mod stage;
mod strategy;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Public API
pub use config::{FormRequestMode, FormatKind, LogbookConfig, SinkKind, StrategyKind};
pub use correlation::{
    Correlation, CorrelationId, DefaultCorrelationId, HeaderCorrelationId, Precorrelation,
    UuidCorrelationId,
};
pub use error::{BoxError, ConfigError, LogError, Phase, Result};
pub use exchange::{Exchange, ExchangeSlots, WriteOnceGuard};
pub use filter::{
    BodyFilter, BodyReplacer, FilterChain, HeaderFilter, PathFilter, QueryFilter, RequestFilter,
    ResponseFilter,
};
pub use formatter::{
    DefaultHttpLogFormatter, HttpLogFormatter, JsonHttpLogFormatter, LogfmtHttpLogFormatter,
};
pub use headers::HttpHeaders;
pub use logger::{Condition, ErrorHandler, HttpLogger, HttpLoggerBuilder};
pub use message::{protocol_name, HttpMessage, HttpRequest, HttpResponse, Origin};
pub use sink::{DisabledSink, LogWriter, Sink, TracingSink};
pub use stage::{RequestWritingStage, ResponseProcessingStage, ResponseWritingStage};
pub use strategy::{
    BodyOnlyIfStatusAtLeastStrategy, DefaultStrategy, SamplingStrategy, StatusAtLeastStrategy,
    Strategy, WithoutBodyStrategy,
};

/// Commonly used items
pub mod prelude {
    pub use crate::filter::{body, header, path, query, replacer, request, response};
    pub use crate::{
        BodyFilter, BodyReplacer, Correlation, CorrelationId, DefaultHttpLogFormatter,
        HeaderFilter, HttpHeaders, HttpLogFormatter, HttpLogger, HttpMessage, HttpRequest,
        HttpResponse, JsonHttpLogFormatter, LogError, LogbookConfig, LogfmtHttpLogFormatter,
        Origin, PathFilter, Precorrelation, QueryFilter, RequestFilter, ResponseFilter, Sink,
        StatusAtLeastStrategy, Strategy, TracingSink,
    };
}
