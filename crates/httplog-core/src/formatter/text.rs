//! HTTP-like text records

use super::{duration_millis, title, HttpLogFormatter};
use crate::correlation::{Correlation, Precorrelation};
use crate::error::{Phase, Result};
use crate::headers::HttpHeaders;
use crate::message::{HttpMessage, HttpRequest, HttpResponse};
use std::fmt::Write;

/// Formats records the way the messages look on the wire.
///
/// ```text
/// Incoming Request: 2d66e4bc9a0ea1f3
/// Remote: 127.0.0.1
/// GET http://localhost/test HTTP/1.1
/// Accept: text/plain
///
/// Outgoing Response: 2d66e4bc9a0ea1f3
/// Duration: 3 ms
/// HTTP/1.1 200 OK
/// Content-Type: text/plain
///
/// Hello, world!
/// ```
#[derive(Clone, Debug, Default)]
pub struct DefaultHttpLogFormatter;

impl DefaultHttpLogFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self
    }
}

impl HttpLogFormatter for DefaultHttpLogFormatter {
    fn format_request(
        &self,
        precorrelation: &Precorrelation,
        request: &HttpRequest,
    ) -> Result<String> {
        let mut out = String::with_capacity(256 + request.body().len());
        let _ = writeln!(
            out,
            "{}: {}",
            title(request.origin(), Phase::Request),
            precorrelation.id()
        );
        let _ = writeln!(out, "Remote: {}", request.remote());
        let _ = write!(
            out,
            "{} {} {}",
            request.method(),
            request.request_uri(),
            request.protocol_version()
        );
        write_headers_and_body(&mut out, request.headers(), &request.body_as_string());
        Ok(out)
    }

    fn format_response(
        &self,
        correlation: &Correlation,
        response: &HttpResponse,
    ) -> Result<String> {
        let mut out = String::with_capacity(256 + response.body().len());
        let _ = writeln!(
            out,
            "{}: {}",
            title(response.origin(), Phase::Response),
            correlation.id()
        );
        let _ = writeln!(out, "Duration: {} ms", duration_millis(correlation.duration()));
        let _ = write!(
            out,
            "{} {} {}",
            response.protocol_version(),
            response.status().as_u16(),
            response.reason_phrase()
        );
        write_headers_and_body(&mut out, response.headers(), &response.body_as_string());
        Ok(out)
    }
}

fn write_headers_and_body(out: &mut String, headers: &HttpHeaders, body: &str) {
    for (name, values) in headers.iter() {
        let _ = write!(out, "\n{}: {}", name, values.join(", "));
    }
    if !body.is_empty() {
        out.push_str("\n\n");
        out.push_str(body);
    }
}
