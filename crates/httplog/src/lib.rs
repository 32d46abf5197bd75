//! # httplog
//!
//! Structured, filtered logging of HTTP requests and responses for `tower`
//! services and clients.
//!
//! Every exchange goes through the same pipeline: a condition and a
//! strategy decide whether it is logged, filters redact what must not reach
//! the logs, a formatter renders records and a sink writes them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use httplog::prelude::*;
//! use tower::ServiceBuilder;
//!
//! let logger = HttpLogger::builder()
//!     .header_filter(header::replace_headers(["X-Api-Key"], "XXX"))
//!     .formatter(JsonHttpLogFormatter::new())
//!     .build();
//!
//! let app = ServiceBuilder::new()
//!     .layer(LogbookLayer::new(logger))
//!     .service(app);
//! ```
//!
//! ## Optional Features
//!
//! - `server` - `LogbookLayer` for services receiving requests (default)
//! - `client` - `LogbookClientLayer` for services sending requests (default)
//! - `env` - `LogbookConfig::from_env` and `.env` file loading
//! - `test-utils` - `RecordingSink` and `TestStrategy`
//! - `full` - All optional features enabled
//!
//! ```toml
//! [dependencies]
//! httplog = { version = "0.1", features = ["env"] }
//! ```

// Re-export core functionality
pub use httplog_core::*;

#[cfg(feature = "server")]
pub use httplog_server::{LogbookLayer, LogbookService};

#[cfg(feature = "client")]
pub use httplog_client::{LogbookClient, LogbookClientLayer};

/// Prelude module - import everything you need with `use httplog::prelude::*`
pub mod prelude {
    pub use httplog_core::prelude::*;
    pub use httplog_core::{
        BodyOnlyIfStatusAtLeastStrategy, DefaultStrategy, DisabledSink, SamplingStrategy,
        WithoutBodyStrategy,
    };

    #[cfg(feature = "server")]
    pub use httplog_server::LogbookLayer;

    #[cfg(feature = "client")]
    pub use httplog_client::LogbookClientLayer;
}
