//! Configuration for building a logger from plain settings
//!
//! [`LogbookConfig`] is a serde-deserializable description of a logging
//! setup. Every field has a default, so an empty configuration logs every
//! exchange as HTTP-style text through `tracing`.
//!
//! With the `env` feature the configuration can be read from `HTTPLOG_*`
//! environment variables, optionally loaded from a `.env` file first:
//!
//! ```ignore
//! use httplog_core::config::{load_dotenv, LogbookConfig};
//! use httplog_core::HttpLogger;
//!
//! load_dotenv();
//! // HTTPLOG_STRATEGY=status-at-least
//! // HTTPLOG_OBFUSCATE_HEADERS=authorization,x-api-key
//! let config = LogbookConfig::from_env()?;
//! let logger = HttpLogger::from_config(&config)?;
//! ```

use crate::error::ConfigError;
use crate::filter::{self, body, header, path, query, replacer};
use crate::formatter::{DefaultHttpLogFormatter, JsonHttpLogFormatter, LogfmtHttpLogFormatter};
use crate::logger::{HttpLogger, HttpLoggerBuilder};
use crate::message::{HttpRequest, HttpResponse};
use crate::sink::{DisabledSink, TracingSink};
use crate::strategy::{
    BodyOnlyIfStatusAtLeastStrategy, DefaultStrategy, SamplingStrategy, StatusAtLeastStrategy,
    WithoutBodyStrategy,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which [`Strategy`](crate::Strategy) to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Log every exchange
    #[default]
    Default,
    /// Log exchanges whose status reaches `min_status`
    StatusAtLeast,
    /// Log every exchange, bodies only when the status reaches `min_status`
    BodyOnlyIfStatusAtLeast,
    /// Log every exchange without bodies
    WithoutBody,
    /// Log a `sample_rate` fraction of exchanges
    Sampling,
}

/// Where records go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkKind {
    /// `tracing` events at the configured level
    #[default]
    Tracing,
    /// Nowhere; logging is disabled
    Off,
}

/// How records are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatKind {
    /// HTTP-style text
    #[default]
    Http,
    /// One JSON object per record
    Json,
    /// One `key=value` line per record
    Logfmt,
}

/// How server adapters treat `application/x-www-form-urlencoded` requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormRequestMode {
    /// Buffer the body and log it as sent
    #[default]
    Body,
    /// Buffer the body and log its parameters re-encoded
    Parameter,
    /// Stream the body through and log none of it
    Off,
}

impl FormRequestMode {
    /// Whether the request body should be buffered
    pub fn buffers(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Settings resolved once into an [`HttpLogger`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogbookConfig {
    /// Logging strategy
    pub strategy: StrategyKind,
    /// Status threshold of the status strategies
    pub min_status: u16,
    /// Fraction of exchanges logged by the sampling strategy
    pub sample_rate: f64,
    /// Record destination
    pub sink: SinkKind,
    /// Level of `tracing` records
    pub level: String,
    /// Record format
    pub format: FormatKind,
    /// Headers to redact; empty keeps the authorization defaults
    pub obfuscate_headers: Vec<String>,
    /// Query parameters to redact; empty keeps the access token default
    pub obfuscate_parameters: Vec<String>,
    /// Path templates whose variable segments are redacted
    pub obfuscate_paths: Vec<String>,
    /// JSON properties to redact; empty keeps the credential defaults
    pub obfuscate_json_properties: Vec<String>,
    /// Redaction marker
    pub replacement: String,
    /// Path prefixes that are never logged
    pub exclude_paths: Vec<String>,
    /// Maximum logged body length in characters
    pub max_body_size: Option<usize>,
    /// Additional content types whose bodies are logged as `<binary>`
    pub replace_content_types: Vec<String>,
    /// Treatment of form request bodies
    pub form_request_mode: FormRequestMode,
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Default,
            min_status: 400,
            sample_rate: 1.0,
            sink: SinkKind::Tracing,
            level: "info".to_string(),
            format: FormatKind::Http,
            obfuscate_headers: Vec::new(),
            obfuscate_parameters: Vec::new(),
            obfuscate_paths: Vec::new(),
            obfuscate_json_properties: Vec::new(),
            replacement: filter::REDACTED.to_string(),
            exclude_paths: Vec::new(),
            max_body_size: None,
            replace_content_types: Vec::new(),
            form_request_mode: FormRequestMode::Body,
        }
    }
}

impl LogbookConfig {
    /// Read the configuration from `HTTPLOG_*` environment variables.
    ///
    /// Lists are comma separated, e.g. `HTTPLOG_EXCLUDE_PATHS=/health,/metrics`.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_prefixed("HTTPLOG")
    }

    /// Read the configuration from `{prefix}_*` environment variables
    #[cfg(feature = "env")]
    pub fn from_env_prefixed(prefix: &str) -> Result<Self, ConfigError> {
        envy::prefixed(format!("{}_", prefix))
            .from_env::<Self>()
            .map_err(ConfigError::from)
    }

    /// The tracing level of records
    pub fn tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        self.level
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidLevel(self.level.clone()))
    }

    fn min_status_code(&self) -> Result<StatusCode, ConfigError> {
        StatusCode::from_u16(self.min_status).map_err(|_| ConfigError::InvalidValue {
            field: "min_status",
            message: format!("{} is not an HTTP status code", self.min_status),
        })
    }

    fn checked_sample_rate(&self) -> Result<f64, ConfigError> {
        if (0.0..=1.0).contains(&self.sample_rate) {
            Ok(self.sample_rate)
        } else {
            Err(ConfigError::InvalidValue {
                field: "sample_rate",
                message: format!("{} is outside 0.0..=1.0", self.sample_rate),
            })
        }
    }

    /// Apply these settings to a builder
    pub fn apply(&self, builder: HttpLoggerBuilder) -> Result<HttpLoggerBuilder, ConfigError> {
        let level = self.tracing_level()?;
        let replacement = self.replacement.as_str();

        let mut builder = match self.strategy {
            StrategyKind::Default => builder.strategy(DefaultStrategy),
            StrategyKind::StatusAtLeast => {
                builder.strategy(StatusAtLeastStrategy::new(self.min_status_code()?))
            }
            StrategyKind::BodyOnlyIfStatusAtLeast => {
                builder.strategy(BodyOnlyIfStatusAtLeastStrategy::new(self.min_status_code()?))
            }
            StrategyKind::WithoutBody => builder.strategy(WithoutBodyStrategy),
            StrategyKind::Sampling => {
                builder.strategy(SamplingStrategy::new(self.checked_sample_rate()?))
            }
        };

        builder = match self.sink {
            SinkKind::Tracing => builder.sink(TracingSink::new(level)),
            SinkKind::Off => builder.sink(DisabledSink),
        };

        builder = match self.format {
            FormatKind::Http => builder.formatter(DefaultHttpLogFormatter::new()),
            FormatKind::Json => builder.formatter(JsonHttpLogFormatter::new()),
            FormatKind::Logfmt => builder.formatter(LogfmtHttpLogFormatter::new()),
        };

        if !self.exclude_paths.is_empty() {
            builder = builder.exclude_paths(self.exclude_paths.iter().cloned());
        }
        if !self.obfuscate_headers.is_empty() {
            builder = builder.header_filter(header::replace_headers(
                &self.obfuscate_headers,
                replacement,
            ));
        }
        if !self.obfuscate_parameters.is_empty() {
            builder = builder.query_filter(query::replace_query(
                &self.obfuscate_parameters,
                replacement,
            ));
        }
        for template in &self.obfuscate_paths {
            builder = builder.path_filter(path::replace(replacement, template));
        }

        builder = if self.obfuscate_json_properties.is_empty() {
            builder.body_filter(body::default_value())
        } else {
            builder.body_filter(body::replace_json_string_property(
                &self.obfuscate_json_properties,
                replacement,
            ))
        };
        if let Some(max) = self.max_body_size {
            builder = builder.body_filter(body::truncate(max));
        }

        if !self.replace_content_types.is_empty() {
            let types = &self.replace_content_types;
            builder = builder
                .request_filter(filter::request::replace_body(
                    replacer::default_value::<HttpRequest>()
                        .then(replacer::content_type::<HttpRequest, _, _>(types, "<binary>")),
                ))
                .response_filter(filter::response::replace_body(
                    replacer::default_value::<HttpResponse>()
                        .then(replacer::content_type::<HttpResponse, _, _>(types, "<binary>")),
                ));
        }

        Ok(builder)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::StatusAtLeast => "status-at-least",
            Self::BodyOnlyIfStatusAtLeast => "body-only-if-status-at-least",
            Self::WithoutBody => "without-body",
            Self::Sampling => "sampling",
        };
        f.write_str(name)
    }
}

impl HttpLogger {
    /// Build a logger from settings, resolving every option once
    pub fn from_config(config: &LogbookConfig) -> Result<Self, ConfigError> {
        tracing::debug!(strategy = %config.strategy, "building logger from configuration");
        Ok(config.apply(HttpLogger::builder())?.build())
    }
}

/// Load environment variables from a `.env` file in the current directory.
///
/// A missing file is not an error.
#[cfg(feature = "env")]
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Load environment variables from a specific `.env` file
#[cfg(feature = "env")]
pub fn load_dotenv_from<P: AsRef<std::path::Path>>(path: P) {
    let _ = dotenvy::from_path(path);
}
