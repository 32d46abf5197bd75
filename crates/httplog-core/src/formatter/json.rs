//! JSON records

use super::{request_fields, response_fields, HttpLogFormatter};
use crate::correlation::{Correlation, Precorrelation};
use crate::error::{LogError, Phase, Result};
use crate::message::{HttpRequest, HttpResponse};
use serde_json::{Map, Value};

/// Formats each record as a single JSON object
///
/// JSON bodies are embedded as JSON values so log pipelines can index them;
/// every other body is embedded as a string.
#[derive(Clone, Debug, Default)]
pub struct JsonHttpLogFormatter {
    /// Whether to pretty print JSON
    pub pretty: bool,
}

impl JsonHttpLogFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pretty-printing JSON formatter
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    fn render(&self, phase: Phase, fields: Map<String, Value>) -> Result<String> {
        let value = Value::Object(fields);
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        rendered.map_err(|e| LogError::formatting(phase, e.to_string()))
    }
}

impl HttpLogFormatter for JsonHttpLogFormatter {
    fn format_request(
        &self,
        precorrelation: &Precorrelation,
        request: &HttpRequest,
    ) -> Result<String> {
        self.render(Phase::Request, request_fields(precorrelation, request))
    }

    fn format_response(
        &self,
        correlation: &Correlation,
        response: &HttpResponse,
    ) -> Result<String> {
        self.render(Phase::Response, response_fields(correlation, response))
    }
}
