//! Blocked file extension check.
//!
//! Requests for server-side script or executable artifacts are never
//! legitimate through this proxy; the origin serves rendered responses,
//! not its own source files.

use crate::rules::view::RequestView;

const BLOCKED_EXTENSIONS: &[&str] = &[
    ".php", ".asp", ".aspx", ".jsp", ".cgi", ".pl", ".sh", ".bat", ".cmd",
    ".exe", ".dll", ".so", ".dylib", ".jar", ".war", ".ear", ".class",
];

pub fn check(view: &RequestView) -> Option<String> {
    BLOCKED_EXTENSIONS
        .iter()
        .find(|ext| view.path.ends_with(*ext))
        .map(|ext| format!("blocked extension '{ext}'"))
}
