//! SQL injection detection.
//!
//! Three tiers: unambiguous signatures (tautologies, UNION extraction,
//! stacked DDL) always active when the category is, balanced patterns at
//! moderate, and evasion-oriented patterns (timing functions, hex
//! literals, comment splicing) at strict.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::view::RequestView;
use crate::rules::SecurityLevel;

static CORE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\bunion\s+(?:all\s+)?select\b").unwrap(),
        Regex::new(r"(?i)\b(?:or|and)\s+\d+\s*=\s*\d+").unwrap(),
        Regex::new(r#"(?i)'\s*(?:or|and)\s*'"#).unwrap(),
        Regex::new(r"(?i)\bdrop\s+table\b").unwrap(),
        Regex::new(r"(?i)\bdelete\s+from\b").unwrap(),
        Regex::new(r"(?i)\binsert\s+into\b").unwrap(),
        Regex::new(r"'--").unwrap(),
    ]
});

static MODERATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\bselect\b.+\bfrom\b").unwrap(),
        Regex::new(r"(?i)\bupdate\b.+\bset\b").unwrap(),
        Regex::new(r"(?i);\s*(?:drop|delete|update|insert)\b").unwrap(),
        Regex::new(r"(?i)\bexec(?:ute)?\s*\(").unwrap(),
        Regex::new(r#"(?i)\b(?:or|and)\s+['\x22]?\w+['\x22]?\s*=\s*['\x22]?\w+['\x22]?"#).unwrap(),
        Regex::new(r"--\s*$").unwrap(),
    ]
});

static STRICT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:benchmark|sleep|waitfor\s+delay)\s*[\s(]").unwrap(),
        Regex::new(r"(?i)\b(?:xp_|sp_)\w+").unwrap(),
        Regex::new(r"(?i)0x[0-9a-f]{6,}").unwrap(),
        // Inline comment splicing: UN/**/ION style evasion.
        Regex::new(r"(?i)/\*.{0,40}\*/").unwrap(),
        Regex::new(r"(?i)\bconcat\s*\(").unwrap(),
        Regex::new(r"(?i)\binformation_schema\b").unwrap(),
    ]
});

pub fn check(view: &RequestView, level: SecurityLevel) -> Option<String> {
    let haystacks = [view.target.as_str(), view.body_text.as_str()];

    for text in haystacks {
        if let Some(pattern) = CORE_PATTERNS.iter().find(|p| p.is_match(text)) {
            return Some(format!("sql signature matched '{pattern}'"));
        }
        if level >= SecurityLevel::Moderate {
            if let Some(pattern) = MODERATE_PATTERNS.iter().find(|p| p.is_match(text)) {
                return Some(format!("sql pattern matched '{pattern}'"));
            }
        }
        if level == SecurityLevel::Strict {
            if let Some(pattern) = STRICT_PATTERNS.iter().find(|p| p.is_match(text)) {
                return Some(format!("sql evasion pattern matched '{pattern}'"));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::view::view_for;

    #[test]
    fn union_select_is_flagged_from_moderate_up() {
        let view = view_for("/?id=1%20UNION%20SELECT%20*%20FROM%20users--");
        assert!(check(&view, SecurityLevel::Moderate).is_some());
        assert!(check(&view, SecurityLevel::Strict).is_some());
        // Unambiguous enough for the relaxed core as well.
        assert!(check(&view, SecurityLevel::Relaxed).is_some());
    }

    #[test]
    fn numeric_tautology_is_core() {
        let view = view_for("/login?user=admin'%20OR%201=1--");
        assert!(check(&view, SecurityLevel::Relaxed).is_some());
    }

    #[test]
    fn timing_probe_only_at_strict() {
        let view = view_for("/?id=1%20AND%20SLEEP(5)");
        assert!(check(&view, SecurityLevel::Moderate).is_none());
        assert!(check(&view, SecurityLevel::Strict).is_some());
    }

    #[test]
    fn ordinary_text_passes() {
        let view = view_for("/articles?title=the+union+of+two+sets");
        assert!(check(&view, SecurityLevel::Moderate).is_none());
    }
}
