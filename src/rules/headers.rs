//! Suspicious header checks.
//!
//! Covers oversized header values, request-smuggling shapes, header names
//! used to rewrite routing decisions, and injection payloads smuggled
//! through client-identity headers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::view::RequestView;

const MAX_HEADER_VALUE_LEN: usize = 8 * 1024;

/// Headers some frameworks honour to override the routed URL or method.
const OVERRIDE_HEADERS: &[&str] = &[
    "x-original-url",
    "x-rewrite-url",
    "x-override-url",
    "x-http-method-override",
];

/// Client-identity headers attackers use to carry payloads past naive
/// logging and ACL layers.
const IDENTITY_HEADERS: &[&str] = &[
    "x-forwarded-for",
    "x-real-ip",
    "x-originating-ip",
    "x-remote-ip",
    "x-remote-addr",
    "x-client-ip",
    "x-cluster-client-ip",
    "forwarded",
];

static INJECTED_VALUE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)<script").unwrap(),
        Regex::new(r"(?i)javascript:").unwrap(),
        Regex::new(r"(?i)\bon(?:load|error|click)\s*=").unwrap(),
        Regex::new(r"['\x22]\s*(?i:or)\s*['\x22]").unwrap(),
    ]
});

pub fn check(view: &RequestView) -> Option<String> {
    let mut has_content_length = false;
    let mut has_transfer_encoding = false;

    for (name, value) in &view.headers {
        if value.len() > MAX_HEADER_VALUE_LEN {
            return Some(format!("oversized header '{name}' ({} bytes)", value.len()));
        }
        match name.as_str() {
            "content-length" => has_content_length = true,
            "transfer-encoding" => {
                has_transfer_encoding = true;
                let codings_ok = value
                    .split(',')
                    .map(|c| c.trim().to_ascii_lowercase())
                    .all(|c| matches!(c.as_str(), "chunked" | "identity" | "gzip" | "deflate" | "compress"));
                if !codings_ok {
                    return Some(format!("unrecognized transfer-encoding '{value}'"));
                }
            }
            _ => {}
        }

        if OVERRIDE_HEADERS.contains(&name.as_str()) {
            return Some(format!("url/method override header '{name}'"));
        }
        if IDENTITY_HEADERS.contains(&name.as_str()) {
            let value_lower = value.to_ascii_lowercase();
            if INJECTED_VALUE.iter().any(|p| p.is_match(&value_lower)) {
                return Some(format!("injection payload in header '{name}'"));
            }
        }
    }

    // Both framing headers present is the classic smuggling ambiguity.
    if has_content_length && has_transfer_encoding {
        return Some("both content-length and transfer-encoding present".to_string());
    }

    None
}
