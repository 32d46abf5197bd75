//! Logfmt records (key=value pairs)

use super::{request_fields, response_fields, HttpLogFormatter};
use crate::correlation::{Correlation, Precorrelation};
use crate::error::Result;
use crate::message::{HttpRequest, HttpResponse};
use serde_json::{Map, Value};

/// Formats each record as a single `key=value` line
///
/// Headers and structured bodies are rendered as compact JSON inside a
/// quoted value.
#[derive(Clone, Debug, Default)]
pub struct LogfmtHttpLogFormatter;

impl LogfmtHttpLogFormatter {
    /// Create a new Logfmt formatter
    pub fn new() -> Self {
        Self
    }
}

impl HttpLogFormatter for LogfmtHttpLogFormatter {
    fn format_request(
        &self,
        precorrelation: &Precorrelation,
        request: &HttpRequest,
    ) -> Result<String> {
        Ok(render(request_fields(precorrelation, request)))
    }

    fn format_response(
        &self,
        correlation: &Correlation,
        response: &HttpResponse,
    ) -> Result<String> {
        Ok(render(response_fields(correlation, response)))
    }
}

fn render(fields: Map<String, Value>) -> String {
    fields
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| match value {
            Value::String(s) if is_bare(&s) => format!("{}={}", key, s),
            Value::String(s) => format!("{}=\"{}\"", key, escape_logfmt(&s)),
            Value::Number(n) => format!("{}={}", key, n),
            Value::Bool(b) => format!("{}={}", key, b),
            other => format!("{}=\"{}\"", key, escape_logfmt(&other.to_string())),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_bare(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| !c.is_whitespace() && c != '"' && c != '=' && c != '\\')
}

/// Escape special characters for logfmt
fn escape_logfmt(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Origin;
    use http::{Method, StatusCode};

    #[test]
    fn test_request_line() {
        let request = HttpRequest::new(
            Origin::Local,
            Method::GET,
            &"http://localhost:8080/a?b=c".parse().unwrap(),
        )
        .with_remote("localhost")
        .with_headers([("Accept", "text/plain")].into_iter().collect());

        let output = LogfmtHttpLogFormatter::new()
            .format_request(&Precorrelation::new("abc"), &request)
            .unwrap();

        assert!(output.starts_with("origin=local type=request correlation=abc"));
        assert!(output.contains("method=GET"));
        assert!(output.contains(r#"uri="http://localhost:8080/a?b=c""#));
        assert!(output.contains("port=8080"));
        assert!(output.contains(r#"headers="{\"Accept\":[\"text/plain\"]}""#));
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_body_is_quoted_and_escaped() {
        let response = HttpResponse::new(Origin::Remote, StatusCode::OK)
            .with_body("line one\nline \"two\"");
        let output = LogfmtHttpLogFormatter::new()
            .format_response(&Precorrelation::new("x").correlate(), &response)
            .unwrap();
        assert!(output.contains("status=200"));
        assert!(output.contains(r#"body="line one\nline \"two\"""#));
    }

    #[test]
    fn test_null_port_is_skipped() {
        let request = HttpRequest::new(Origin::Remote, Method::GET, &"/".parse().unwrap());
        let output = LogfmtHttpLogFormatter::new()
            .format_request(&Precorrelation::new("x"), &request)
            .unwrap();
        assert!(!output.contains("port="));
        assert!(output.contains(r#"remote="""#));
    }
}
