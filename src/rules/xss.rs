//! Cross-site scripting detection.
//!
//! Patterns run over the decoded target and body; the raw target is also
//! scanned at strict for variants hidden behind a second encoding layer.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::view::RequestView;
use crate::rules::SecurityLevel;

static CORE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)<script").unwrap(),
        Regex::new(r"(?i)javascript:").unwrap(),
        Regex::new(r"(?i)\bon(?:error|load)\s*=").unwrap(),
    ]
});

static MODERATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)<iframe").unwrap(),
        Regex::new(r"(?i)<object").unwrap(),
        Regex::new(r"(?i)<embed").unwrap(),
        Regex::new(r"(?i)\bon(?:click|mouseover|focus|blur|submit|input|pointerover)\s*=").unwrap(),
        Regex::new(r"(?i)vbscript:").unwrap(),
        Regex::new(r"(?i)expression\s*\(").unwrap(),
        Regex::new(r"(?i)data:text/html").unwrap(),
        Regex::new(r"(?i)data:application/javascript").unwrap(),
    ]
});

static STRICT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Any inline event handler attribute.
        Regex::new(r"(?i)\bon\w+\s*=").unwrap(),
        Regex::new(r"(?i)<svg").unwrap(),
        Regex::new(r"(?i)srcdoc\s*=").unwrap(),
        // Entity-encoded script tag openers.
        Regex::new(r"(?i)&#x?0*(?:3c|60);?\s*script").unwrap(),
        Regex::new(r"(?i)&lt;\s*script").unwrap(),
    ]
});

/// Double-encoded markers, matched on the raw target only.
static RAW_STRICT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)%253c\s*script").unwrap(),
        Regex::new(r"(?i)%253cscript").unwrap(),
    ]
});

pub fn check(view: &RequestView, level: SecurityLevel) -> Option<String> {
    let haystacks = [view.target.as_str(), view.body_text.as_str()];

    for text in haystacks {
        if let Some(pattern) = CORE_PATTERNS.iter().find(|p| p.is_match(text)) {
            return Some(format!("xss marker matched '{pattern}'"));
        }
        if level >= SecurityLevel::Moderate {
            if let Some(pattern) = MODERATE_PATTERNS.iter().find(|p| p.is_match(text)) {
                return Some(format!("xss pattern matched '{pattern}'"));
            }
        }
        if level == SecurityLevel::Strict {
            if let Some(pattern) = STRICT_PATTERNS.iter().find(|p| p.is_match(text)) {
                return Some(format!("xss evasion pattern matched '{pattern}'"));
            }
        }
    }

    if level == SecurityLevel::Strict {
        if let Some(pattern) = RAW_STRICT_PATTERNS
            .iter()
            .find(|p| p.is_match(&view.raw_target))
        {
            return Some(format!("double-encoded xss matched '{pattern}'"));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::view::view_for;

    #[test]
    fn script_tag_in_query_is_core() {
        let view = view_for("/?q=%3Cscript%3Ealert(1)%3C/script%3E");
        assert!(check(&view, SecurityLevel::Relaxed).is_some());
        assert!(check(&view, SecurityLevel::Moderate).is_some());
    }

    #[test]
    fn event_handler_tiers() {
        let onload = view_for("/?html=%3Cimg%20onload=steal()%3E");
        assert!(check(&onload, SecurityLevel::Relaxed).is_some());

        let exotic = view_for("/?html=%3Cimg%20onwheel=steal()%3E");
        assert!(check(&exotic, SecurityLevel::Moderate).is_none());
        assert!(check(&exotic, SecurityLevel::Strict).is_some());
    }

    #[test]
    fn javascript_scheme_is_core() {
        let view = view_for("/redirect?to=javascript:alert(document.cookie)");
        assert!(check(&view, SecurityLevel::Relaxed).is_some());
    }

    #[test]
    fn markup_free_text_passes() {
        let view = view_for("/search?q=rust+async+runtime+comparison");
        assert!(check(&view, SecurityLevel::Strict).is_none());
    }
}
