//! Request body handling by content type

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use httplog_core::FormRequestMode;

/// What the adapter does with a request body before dispatching it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handling {
    /// Buffer and log the body as sent
    Buffer,
    /// Buffer the body and log its parameters re-encoded
    Normalize,
    /// Forward the body untouched and log none of it
    Stream,
}

pub(crate) fn handling(headers: &HeaderMap, mode: FormRequestMode) -> Handling {
    let media_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if media_type.starts_with("multipart/") {
        return Handling::Stream;
    }
    if media_type != "application/x-www-form-urlencoded" {
        return Handling::Buffer;
    }
    if !mode.buffers() {
        return Handling::Stream;
    }
    match mode {
        FormRequestMode::Parameter => Handling::Normalize,
        _ => Handling::Buffer,
    }
}

/// Re-encode form parameters canonically; undecodable bodies are kept as sent
pub(crate) fn normalize(body: &Bytes) -> Bytes {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .ok()
        .and_then(|pairs| serde_urlencoded::to_string(pairs).ok())
        .map(Bytes::from)
        .unwrap_or_else(|| body.clone())
}
