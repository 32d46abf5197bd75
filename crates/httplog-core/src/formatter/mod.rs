//! Formatters render filtered messages into log records
//!
//! Three formats are provided:
//!
//! - [`DefaultHttpLogFormatter`]: HTTP-like text, close to what travels on the wire
//! - [`JsonHttpLogFormatter`]: one JSON object per record
//! - [`LogfmtHttpLogFormatter`]: one `key=value` line per record
//!
//! Formatting is deterministic: the same correlation and message always
//! render to the same string.

mod json;
mod logfmt;
mod text;

pub use json::JsonHttpLogFormatter;
pub use logfmt::LogfmtHttpLogFormatter;
pub use text::DefaultHttpLogFormatter;

use crate::correlation::{Correlation, Precorrelation};
use crate::error::{Phase, Result};
use crate::filter::is_json;
use crate::message::{HttpMessage, HttpRequest, HttpResponse, Origin};
use serde_json::{Map, Value};
use std::time::Duration;

/// Renders request and response views into records
pub trait HttpLogFormatter: Send + Sync + 'static {
    /// Render a request record
    fn format_request(&self, precorrelation: &Precorrelation, request: &HttpRequest)
        -> Result<String>;

    /// Render a response record
    fn format_response(&self, correlation: &Correlation, response: &HttpResponse)
        -> Result<String>;
}

/// `Incoming` for messages produced by the peer, `Outgoing` for our own
pub(crate) fn direction(origin: Origin) -> &'static str {
    match origin {
        Origin::Remote => "Incoming",
        Origin::Local => "Outgoing",
    }
}

/// Record title such as `Incoming Request`
pub(crate) fn title(origin: Origin, phase: Phase) -> String {
    let kind = match phase {
        Phase::Request => "Request",
        Phase::Response => "Response",
    };
    format!("{} {}", direction(origin), kind)
}

pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Fields shared by the structured formatters, in output order
pub(crate) fn request_fields(precorrelation: &Precorrelation, request: &HttpRequest) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("origin".into(), request.origin().as_str().into());
    fields.insert("type".into(), "request".into());
    fields.insert("correlation".into(), precorrelation.id().into());
    fields.insert("protocol".into(), request.protocol_version().into());
    fields.insert("remote".into(), request.remote().into());
    fields.insert("method".into(), request.method().as_str().into());
    fields.insert("uri".into(), request.request_uri().into());
    fields.insert("host".into(), request.host().into());
    fields.insert("path".into(), request.path().into());
    fields.insert("scheme".into(), request.scheme().into());
    fields.insert(
        "port".into(),
        request.port().map(Value::from).unwrap_or(Value::Null),
    );
    insert_headers_and_body(&mut fields, request);
    fields
}

pub(crate) fn response_fields(correlation: &Correlation, response: &HttpResponse) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("origin".into(), response.origin().as_str().into());
    fields.insert("type".into(), "response".into());
    fields.insert("correlation".into(), correlation.id().into());
    fields.insert("duration".into(), duration_millis(correlation.duration()).into());
    fields.insert("protocol".into(), response.protocol_version().into());
    fields.insert("status".into(), response.status().as_u16().into());
    insert_headers_and_body(&mut fields, response);
    fields
}

fn insert_headers_and_body(fields: &mut Map<String, Value>, message: &impl HttpMessage) {
    if !message.headers().is_empty() {
        let headers: Map<String, Value> = message
            .headers()
            .iter()
            .map(|(name, values)| (name.to_string(), Value::from(values.to_vec())))
            .collect();
        fields.insert("headers".into(), Value::Object(headers));
    }
    if !message.body().is_empty() {
        fields.insert("body".into(), body_value(message));
    }
}

/// JSON bodies are embedded as values, everything else as a string
fn body_value(message: &impl HttpMessage) -> Value {
    let body = message.body_as_string();
    if is_json(message.content_type()) {
        if let Ok(value) = serde_json::from_str::<Value>(&body) {
            return value;
        }
    }
    Value::String(body.into_owned())
}
