//! Loggable views of HTTP messages
//!
//! [`HttpRequest`] and [`HttpResponse`] are immutable value types. Adapters
//! build them from the live `http` message and a buffered copy of its body;
//! filters rewrite them through the `with_*` methods, each of which returns a
//! new value and leaves the input untouched.

use crate::headers::HttpHeaders;
use bytes::Bytes;
use http::{Method, StatusCode, Uri, Version};
use std::borrow::Cow;
use std::fmt;

/// Which side of the connection produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Produced by this process (outgoing)
    Local,
    /// Produced by the peer (incoming)
    Remote,
}

impl Origin {
    /// Get the origin name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Remote => "remote",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render a protocol version the way it appears on a request line
pub fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
}

/// Accessors shared by requests and responses
pub trait HttpMessage {
    /// Which side produced this message
    fn origin(&self) -> Origin;

    /// Protocol version
    fn version(&self) -> Version;

    /// Message headers
    fn headers(&self) -> &HttpHeaders;

    /// Buffered body bytes
    fn body(&self) -> &Bytes;

    /// Whether a body replacer swapped the body for a marker
    fn is_body_replaced(&self) -> bool;

    /// The `Content-Type` header, if present
    fn content_type(&self) -> Option<&str> {
        self.headers().first("Content-Type")
    }

    /// The body decoded as UTF-8, replacing invalid sequences
    fn body_as_string(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.body())
    }

    /// The protocol version as text, e.g. `HTTP/1.1`
    fn protocol_version(&self) -> &'static str {
        protocol_name(self.version())
    }
}

/// A request as seen by the logging pipeline
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    origin: Origin,
    remote: String,
    method: Method,
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
    version: Version,
    headers: HttpHeaders,
    body: Bytes,
    body_replaced: bool,
}

impl HttpRequest {
    /// Create a request view from a method and URI.
    ///
    /// Scheme and host fall back to `http` and the `Host` header (set later
    /// via [`with_headers`](Self::with_headers)) when the URI is relative.
    pub fn new(origin: Origin, method: Method, uri: &Uri) -> Self {
        Self {
            origin,
            remote: String::new(),
            method,
            scheme: uri.scheme_str().unwrap_or("http").to_string(),
            host: uri.host().unwrap_or_default().to_string(),
            port: uri.port_u16(),
            path: uri.path().to_string(),
            query: uri.query().unwrap_or_default().to_string(),
            version: Version::HTTP_11,
            headers: HttpHeaders::new(),
            body: Bytes::new(),
            body_replaced: false,
        }
    }

    /// Build a view from the parts of an `http::Request` and its buffered body
    pub fn from_parts(origin: Origin, parts: &http::request::Parts, body: Bytes) -> Self {
        Self::new(origin, parts.method.clone(), &parts.uri)
            .with_version(parts.version)
            .with_headers(HttpHeaders::from_header_map(&parts.headers))
            .with_body(body)
    }

    /// Address of the peer (client address for servers, target host for clients)
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// URI scheme (`http` or `https`)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host, taken from the URI or the `Host` header
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, if any
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Request path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string without the leading `?`; empty when absent
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Reassemble the absolute request URI
    pub fn request_uri(&self) -> String {
        let mut uri = String::with_capacity(self.path.len() + self.host.len() + 16);
        if !self.host.is_empty() {
            uri.push_str(&self.scheme);
            uri.push_str("://");
            uri.push_str(&self.host);
            if let Some(port) = self.port {
                if !is_default_port(&self.scheme, port) {
                    uri.push(':');
                    uri.push_str(&port.to_string());
                }
            }
        }
        uri.push_str(&self.path);
        if !self.query.is_empty() {
            uri.push('?');
            uri.push_str(&self.query);
        }
        uri
    }

    /// Return a copy with a different remote address
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Return a copy with a different protocol version
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Return a copy with different headers.
    ///
    /// A relative request picks up its host from the `Host` header here.
    pub fn with_headers(mut self, headers: HttpHeaders) -> Self {
        if self.host.is_empty() {
            if let Some(host) = headers.first("Host") {
                let (name, port) = split_host(host);
                self.host = name.to_string();
                self.port = self.port.or(port);
            }
        }
        self.headers = headers;
        self
    }

    /// Return a copy with a different path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Return a copy with a different query string
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Return a copy with a different body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.body_replaced = false;
        self
    }

    /// Return a copy whose body is the given text
    pub fn with_body_text(self, body: impl Into<String>) -> Self {
        self.with_body(Bytes::from(body.into()))
    }

    /// Return a copy whose body is a replacement marker.
    ///
    /// Body filters leave a replaced body alone.
    pub fn with_replaced_body(mut self, marker: impl Into<String>) -> Self {
        self.body = Bytes::from(marker.into());
        self.body_replaced = true;
        self
    }

    /// Return a copy without a body
    pub fn without_body(self) -> Self {
        self.with_body(Bytes::new())
    }
}

impl HttpMessage for HttpRequest {
    fn origin(&self) -> Origin {
        self.origin
    }

    fn version(&self) -> Version {
        self.version
    }

    fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    fn body(&self) -> &Bytes {
        &self.body
    }

    fn is_body_replaced(&self) -> bool {
        self.body_replaced
    }
}

/// A response as seen by the logging pipeline
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    origin: Origin,
    status: StatusCode,
    version: Version,
    headers: HttpHeaders,
    body: Bytes,
    body_replaced: bool,
}

impl HttpResponse {
    /// Create a response view with the given status
    pub fn new(origin: Origin, status: StatusCode) -> Self {
        Self {
            origin,
            status,
            version: Version::HTTP_11,
            headers: HttpHeaders::new(),
            body: Bytes::new(),
            body_replaced: false,
        }
    }

    /// Build a view from the parts of an `http::Response` and its captured body
    pub fn from_parts(origin: Origin, parts: &http::response::Parts, body: Bytes) -> Self {
        Self::new(origin, parts.status)
            .with_version(parts.version)
            .with_headers(HttpHeaders::from_header_map(&parts.headers))
            .with_body(body)
    }

    /// Status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Canonical reason phrase of the status, empty for unknown codes
    pub fn reason_phrase(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// Return a copy with a different status
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Return a copy with a different protocol version
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Return a copy with different headers
    pub fn with_headers(mut self, headers: HttpHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Return a copy with a different body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.body_replaced = false;
        self
    }

    /// Return a copy whose body is the given text
    pub fn with_body_text(self, body: impl Into<String>) -> Self {
        self.with_body(Bytes::from(body.into()))
    }

    /// Return a copy whose body is a replacement marker.
    ///
    /// Body filters leave a replaced body alone.
    pub fn with_replaced_body(mut self, marker: impl Into<String>) -> Self {
        self.body = Bytes::from(marker.into());
        self.body_replaced = true;
        self
    }

    /// Return a copy without a body
    pub fn without_body(self) -> Self {
        self.with_body(Bytes::new())
    }
}

impl HttpMessage for HttpResponse {
    fn origin(&self) -> Origin {
        self.origin
    }

    fn version(&self) -> Version {
        self.version
    }

    fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    fn body(&self) -> &Bytes {
        &self.body
    }

    fn is_body_replaced(&self) -> bool {
        self.body_replaced
    }
}

fn is_default_port(scheme: &str, port: u16) -> bool {
    matches!((scheme, port), ("http", 80) | ("https", 443))
}

fn split_host(host: &str) -> (&str, Option<u16>) {
    let separator = if host.starts_with('[') {
        host.find("]:").map(|i| i + 1)
    } else {
        host.rfind(':')
    };
    match separator {
        Some(i) => match host[i + 1..].parse() {
            Ok(port) => (&host[..i], Some(port)),
            Err(_) => (host, None),
        },
        None => (host, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> HttpRequest {
        HttpRequest::new(Origin::Remote, Method::GET, &uri.parse().unwrap())
    }

    #[test]
    fn test_absolute_uri_is_preserved() {
        let req = request("https://example.org:8443/users?limit=10");
        assert_eq!(req.scheme(), "https");
        assert_eq!(req.host(), "example.org");
        assert_eq!(req.port(), Some(8443));
        assert_eq!(req.request_uri(), "https://example.org:8443/users?limit=10");
    }

    #[test]
    fn test_relative_uri_takes_host_header() {
        let req = request("/test?x=1")
            .with_headers([("Host", "localhost:8080")].into_iter().collect());
        assert_eq!(req.host(), "localhost");
        assert_eq!(req.port(), Some(8080));
        assert_eq!(req.request_uri(), "http://localhost:8080/test?x=1");
    }

    #[test]
    fn test_default_port_is_omitted() {
        let req = request("http://example.org:80/");
        assert_eq!(req.request_uri(), "http://example.org/");
    }

    #[test]
    fn test_relative_uri_without_host() {
        assert_eq!(request("/only/path").request_uri(), "/only/path");
    }

    #[test]
    fn test_with_methods_do_not_touch_input() {
        let original = request("/a").with_body("secret");
        let derived = original.clone().with_body_text("XXX");
        assert_eq!(original.body_as_string(), "secret");
        assert_eq!(derived.body_as_string(), "XXX");
        assert_eq!(derived.body().len(), 3);
    }

    #[test]
    fn test_response_reason_phrase() {
        let res = HttpResponse::new(Origin::Local, StatusCode::BAD_REQUEST);
        assert_eq!(res.reason_phrase(), "Bad Request");
        assert_eq!(res.protocol_version(), "HTTP/1.1");
    }

    #[test]
    fn test_content_type_from_headers() {
        let res = HttpResponse::new(Origin::Remote, StatusCode::OK)
            .with_headers([("content-type", "text/plain")].into_iter().collect());
        assert_eq!(res.content_type(), Some("text/plain"));
    }
}
