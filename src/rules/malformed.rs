//! Malformed request checks.
//!
//! Structurally disqualifying conditions, checked before any pattern
//! matching because they are the cheapest to evaluate.

use crate::rules::view::RequestView;

/// Fixed ceiling on request body size.
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Fixed ceiling on the request target length.
pub const MAX_URL_LENGTH: usize = 2048;

const MAX_HEADER_COUNT: usize = 100;

pub fn check(view: &RequestView) -> Option<String> {
    if let Some(length) = view.content_length {
        if length > MAX_BODY_BYTES {
            return Some(format!(
                "declared body size {} exceeds limit {}",
                length, MAX_BODY_BYTES
            ));
        }
    }
    if view.body_len as u64 > MAX_BODY_BYTES {
        return Some(format!(
            "body size {} exceeds limit {}",
            view.body_len, MAX_BODY_BYTES
        ));
    }

    if view.url_len > MAX_URL_LENGTH {
        return Some(format!(
            "url length {} exceeds limit {}",
            view.url_len, MAX_URL_LENGTH
        ));
    }

    if view.target.contains('\0') {
        return Some("null byte in request target".to_string());
    }
    for (name, value) in &view.headers {
        if value.contains('\0') {
            return Some(format!("null byte in header '{name}'"));
        }
    }

    if view.headers.len() > MAX_HEADER_COUNT {
        return Some(format!(
            "header count {} exceeds limit {}",
            view.headers.len(),
            MAX_HEADER_COUNT
        ));
    }

    None
}
