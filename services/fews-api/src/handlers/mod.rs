//! HTTP request handlers for the FEWS API.

pub mod adapter;
pub mod admin;
pub mod api;
pub mod health;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use renderer::OutputPayload;

/// Percent-encode an id for use as a single path segment. Only unreserved
/// characters are kept, so ids containing `/` stay one segment.
pub fn encode_segment(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

pub(crate) fn payload_response(payload: OutputPayload) -> Response {
    let content_type = payload.content_type();
    ([(header::CONTENT_TYPE, content_type)], Bytes::from(payload.body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("H.meting"), "H.meting");
        assert_eq!(encode_segment("a/b c"), "a%2Fb%20c");
        assert_eq!(encode_segment("é"), "%C3%A9");
    }
}
