//! Error types for httplog
//!
//! Every error in this module belongs to the logging side-channel. None of
//! them is ever allowed to reach the exchange being logged: the pipeline
//! routes them to the logger's error handler instead.

use std::fmt;
use std::io;

/// Result type alias for pipeline operations
pub type Result<T, E = LogError> = std::result::Result<T, E>;

/// Boxed error type used for body streams
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The phase of an exchange an error or record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The request record
    Request,
    /// The response record
    Response,
}

impl Phase {
    /// Get the phase name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Request => "request",
            Phase::Response => "response",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of the logging pipeline
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// A formatter could not render a filtered message
    #[error("failed to format {phase} record: {message}")]
    Formatting {
        /// Phase that failed
        phase: Phase,
        /// Formatter message
        message: String,
    },

    /// The sink rejected a formatted record
    #[error("sink failed to write {phase} record")]
    SinkWrite {
        /// Phase that failed
        phase: Phase,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The response body stream failed before it was fully captured
    #[error("response body failed before it was captured: {0}")]
    BufferFlush(String),

    /// A resumed dispatch found no cached response stage for its exchange
    #[error("no response processing stage cached for exchange")]
    MissingStage,

    /// A filter, strategy or formatter panicked inside a stage
    #[error("{phase} logging panicked")]
    Panicked {
        /// Phase that failed
        phase: Phase,
    },
}

impl LogError {
    /// Create a formatting error
    pub fn formatting(phase: Phase, message: impl Into<String>) -> Self {
        Self::Formatting {
            phase,
            message: message.into(),
        }
    }

    /// Create a sink write error
    pub fn sink(phase: Phase, source: io::Error) -> Self {
        Self::SinkWrite { phase, source }
    }

    /// The phase this error belongs to, if it is tied to one
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Formatting { phase, .. }
            | Self::SinkWrite { phase, .. }
            | Self::Panicked { phase } => Some(*phase),
            Self::BufferFlush(_) | Self::MissingStage => Some(Phase::Response),
        }
    }
}

/// Errors raised while resolving a [`LogbookConfig`](crate::LogbookConfig)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable deserialization failed
    #[cfg(feature = "env")]
    #[error("configuration error: {0}")]
    Env(#[from] envy::Error),

    /// A tracing level could not be parsed
    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    /// A numeric option is out of range
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Why it is invalid
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_error_keeps_source() {
        let err = LogError::sink(Phase::Request, io::Error::new(io::ErrorKind::Other, "down"));
        assert_eq!(err.to_string(), "sink failed to write request record");
        assert_eq!(err.phase(), Some(Phase::Request));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "down");
    }

    #[test]
    fn test_formatting_error_message() {
        let err = LogError::formatting(Phase::Response, "bad json");
        assert_eq!(err.to_string(), "failed to format response record: bad json");
    }

    #[test]
    fn test_missing_stage_is_response_side() {
        assert_eq!(LogError::MissingStage.phase(), Some(Phase::Response));
    }
}
