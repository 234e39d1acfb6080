//! Path traversal detection.
//!
//! Literal traversal sequences are matched on the decoded target; encoded
//! and double-encoded variants are matched on the raw target, where a
//! single decode pass would already have consumed them.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::view::RequestView;
use crate::rules::SecurityLevel;

static LITERAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\.\./").unwrap(),
        Regex::new(r"\.\.\\").unwrap(),
        // Decoded target can end in ".." with nothing after it.
        Regex::new(r"/\.\.$").unwrap(),
    ]
});

static ENCODED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\.\.%2f").unwrap(),
        Regex::new(r"(?i)\.\.%5c").unwrap(),
        Regex::new(r"(?i)%2e%2e[/\\]").unwrap(),
        Regex::new(r"(?i)%2e%2e%2f").unwrap(),
        Regex::new(r"(?i)%2e%2e%5c").unwrap(),
    ]
});

static BROAD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Double-encoded and overlong-UTF8 variants.
        Regex::new(r"(?i)%252e%252e").unwrap(),
        Regex::new(r"(?i)\.\.%252f").unwrap(),
        Regex::new(r"(?i)\.\.%255c").unwrap(),
        Regex::new(r"(?i)%c0%af").unwrap(),
        Regex::new(r"(?i)%c1%9c").unwrap(),
        Regex::new(r"(?i)%c0%2f").unwrap(),
    ]
});

static ABSOLUTE_ESCAPES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(?:^|=|\?|&)/etc/(?:passwd|shadow|hosts)").unwrap(),
        Regex::new(r"(?i)(?:^|=|\?|&)/proc/self/").unwrap(),
        Regex::new(r"(?i)[a-z]:\\windows\\").unwrap(),
    ]
});

pub fn check(view: &RequestView, level: SecurityLevel) -> Option<String> {
    if let Some(pattern) = LITERAL_PATTERNS.iter().find(|p| p.is_match(&view.target)) {
        return Some(format!("traversal sequence matched '{pattern}'"));
    }

    if level == SecurityLevel::Relaxed {
        return None;
    }

    if let Some(pattern) = ENCODED_PATTERNS.iter().find(|p| p.is_match(&view.raw_target)) {
        return Some(format!("encoded traversal matched '{pattern}'"));
    }

    if level == SecurityLevel::Strict {
        if let Some(pattern) = BROAD_PATTERNS.iter().find(|p| p.is_match(&view.raw_target)) {
            return Some(format!("double-encoded traversal matched '{pattern}'"));
        }
        if let Some(pattern) = ABSOLUTE_ESCAPES.iter().find(|p| p.is_match(&view.target)) {
            return Some(format!("absolute path escape matched '{pattern}'"));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::view::view_for;

    #[test]
    fn literal_traversal_flagged_at_every_level() {
        for level in [SecurityLevel::Relaxed, SecurityLevel::Moderate, SecurityLevel::Strict] {
            assert!(
                check(&view_for("/static/../../etc/passwd"), level).is_some(),
                "level {level:?}"
            );
        }
    }

    #[test]
    fn percent_encoded_traversal_flagged_at_moderate() {
        let view = view_for("/files?name=..%2f..%2fetc%2fpasswd");
        assert!(check(&view, SecurityLevel::Moderate).is_some());
    }

    #[test]
    fn double_encoded_only_at_strict() {
        let view = view_for("/files?name=..%252f..%252fsecret");
        assert!(check(&view, SecurityLevel::Moderate).is_none());
        assert!(check(&view, SecurityLevel::Strict).is_some());
    }

    #[test]
    fn version_segments_are_not_traversal() {
        assert!(check(&view_for("/api/v1.2/users"), SecurityLevel::Strict).is_none());
    }
}
