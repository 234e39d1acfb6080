//! Normalized request view for inspection.
//!
//! Detectors are pure functions over this view; building it is the only
//! place the raw request is touched. Percent-decoding and lowercasing
//! happen once here so every pattern table can assume normalized text.

use axum::http::request::Parts;

/// Cap on how much body is inspected as text. Bodies beyond the malformed
/// ceiling are rejected before a view is ever built.
const BODY_TEXT_CAP: usize = 64 * 1024;

/// An owned, normalized projection of one inbound request.
#[derive(Debug)]
pub struct RequestView {
    pub method: String,
    /// Raw request path, as received.
    pub raw_path: String,
    /// Lowercased raw "path?query" (encoded variants still visible).
    pub raw_target: String,
    /// Percent-decoded, lowercased "path?query".
    pub target: String,
    /// Percent-decoded, lowercased path only.
    pub path: String,
    /// Lowercased header names with lossy-decoded values.
    pub headers: Vec<(String, String)>,
    /// Lowercased User-Agent value, if present.
    pub user_agent: Option<String>,
    /// Lossy, lowercased body text (capped).
    pub body_text: String,
    pub body_len: usize,
    /// Declared Content-Length, when parsable.
    pub content_length: Option<u64>,
    /// Length of the full request target in bytes.
    pub url_len: usize,
}

impl RequestView {
    /// Build a view from request parts and the buffered body.
    pub fn new(parts: &Parts, body: &[u8]) -> Self {
        let raw_path = parts.uri.path().to_string();
        let raw_query = parts.uri.query().unwrap_or("").to_string();
        let raw_target = if raw_query.is_empty() {
            raw_path.to_ascii_lowercase()
        } else {
            format!("{}?{}", raw_path, raw_query).to_ascii_lowercase()
        };

        let path = decode_lower(&raw_path);
        let target = if raw_query.is_empty() {
            path.clone()
        } else {
            format!("{}?{}", path, decode_lower(&raw_query))
        };

        let headers: Vec<(String, String)> = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let user_agent = parts
            .headers
            .get("user-agent")
            .map(|v| String::from_utf8_lossy(v.as_bytes()).to_ascii_lowercase());

        let content_length = parts
            .headers
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let inspected = &body[..body.len().min(BODY_TEXT_CAP)];
        let body_text = String::from_utf8_lossy(inspected).to_ascii_lowercase();

        Self {
            method: parts.method.as_str().to_string(),
            url_len: raw_target.len(),
            raw_path,
            raw_target,
            target,
            path,
            headers,
            user_agent,
            body_text,
            body_len: body.len(),
            content_length,
        }
    }

    /// Header value by (lowercased) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn decode_lower(input: &str) -> String {
    let decoded = urlencoding::decode_binary(input.as_bytes());
    String::from_utf8_lossy(&decoded).to_ascii_lowercase()
}

#[cfg(test)]
pub(crate) fn view_for(target: &str) -> RequestView {
    use axum::body::Body;
    use axum::http::Request;
    let request = Request::builder()
        .uri(target)
        .header("host", "example.com")
        .header("user-agent", "Mozilla/5.0")
        .body(Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    RequestView::new(&parts, b"")
}
