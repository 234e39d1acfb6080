//! Attack-signature rule engine.
//!
//! # Data Flow
//! ```text
//! buffered request
//!     → view.rs (decode, lowercase, cap)
//!     → inspect(): ordered detector functions, first match wins
//!     → Verdict (Clean | Flagged)
//! ```
//!
//! # Design Decisions
//! - Detectors are pure functions over the normalized view; no I/O
//! - Fixed evaluation order, cheapest and most disqualifying first
//! - Security level is a lookup into a fixed profile table, not dispatch
//! - Pattern tables are compiled once as statics

pub mod command_injection;
pub mod extensions;
pub mod headers;
pub mod malformed;
pub mod path_traversal;
pub mod sql_injection;
pub mod user_agent;
pub mod view;
pub mod xss;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use view::RequestView;
pub use malformed::MAX_BODY_BYTES;

/// Per-domain strictness setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Relaxed,
    #[default]
    Moderate,
    Strict,
}

/// Attack-signature categories, in fixed evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum RuleCategory {
    MalformedRequest,
    BlockedExtension,
    SuspiciousUserAgent,
    SuspiciousHeader,
    PathTraversal,
    CommandInjection,
    SqlInjection,
    Xss,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleCategory::MalformedRequest => "Malformed Request",
            RuleCategory::BlockedExtension => "Blocked File Extension",
            RuleCategory::SuspiciousUserAgent => "Suspicious User Agent",
            RuleCategory::SuspiciousHeader => "Suspicious Header",
            RuleCategory::PathTraversal => "Path Traversal",
            RuleCategory::CommandInjection => "Command Injection",
            RuleCategory::SqlInjection => "SQL Injection",
            RuleCategory::Xss => "XSS",
        };
        f.write_str(name)
    }
}

/// Intrinsic severity of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

impl RuleCategory {
    pub fn severity(self) -> Severity {
        match self {
            RuleCategory::MalformedRequest => Severity::Medium,
            RuleCategory::BlockedExtension => Severity::Low,
            RuleCategory::SuspiciousUserAgent => Severity::Low,
            RuleCategory::SuspiciousHeader => Severity::Medium,
            RuleCategory::PathTraversal => Severity::High,
            RuleCategory::CommandInjection => Severity::Critical,
            RuleCategory::SqlInjection => Severity::Critical,
            RuleCategory::Xss => Severity::High,
        }
    }
}

/// Outcome of rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Flagged {
        category: RuleCategory,
        details: String,
    },
}

const EVALUATION_ORDER: &[RuleCategory] = &[
    RuleCategory::MalformedRequest,
    RuleCategory::BlockedExtension,
    RuleCategory::SuspiciousUserAgent,
    RuleCategory::SuspiciousHeader,
    RuleCategory::PathTraversal,
    RuleCategory::CommandInjection,
    RuleCategory::SqlInjection,
    RuleCategory::Xss,
];

/// What a security level activates.
struct LevelProfile {
    categories: &'static [RuleCategory],
    require_user_agent: bool,
}

// Path traversal stays active at relaxed (literal patterns only): letting
// "../../etc/passwd" through at any level is indefensible.
const RELAXED_CATEGORIES: &[RuleCategory] = &[
    RuleCategory::MalformedRequest,
    RuleCategory::BlockedExtension,
    RuleCategory::PathTraversal,
    RuleCategory::CommandInjection,
    RuleCategory::SqlInjection,
    RuleCategory::Xss,
];

fn profile(level: SecurityLevel) -> LevelProfile {
    match level {
        SecurityLevel::Relaxed => LevelProfile {
            categories: RELAXED_CATEGORIES,
            require_user_agent: false,
        },
        SecurityLevel::Moderate => LevelProfile {
            categories: EVALUATION_ORDER,
            require_user_agent: false,
        },
        SecurityLevel::Strict => LevelProfile {
            categories: EVALUATION_ORDER,
            require_user_agent: true,
        },
    }
}

/// Evaluate a request against all active categories.
///
/// Pure and allocation-light: no network or disk I/O. First matching
/// category wins; later detectors are not evaluated once one matches.
pub fn inspect(view: &RequestView, level: SecurityLevel) -> Verdict {
    let profile = profile(level);

    for &category in EVALUATION_ORDER {
        if !profile.categories.contains(&category) {
            continue;
        }
        let details = match category {
            RuleCategory::MalformedRequest => malformed::check(view),
            RuleCategory::BlockedExtension => extensions::check(view),
            RuleCategory::SuspiciousUserAgent => {
                user_agent::check(view, profile.require_user_agent)
            }
            RuleCategory::SuspiciousHeader => headers::check(view),
            RuleCategory::PathTraversal => path_traversal::check(view, level),
            RuleCategory::CommandInjection => command_injection::check(view, level),
            RuleCategory::SqlInjection => sql_injection::check(view, level),
            RuleCategory::Xss => xss::check(view, level),
        };
        if let Some(details) = details {
            return Verdict::Flagged { category, details };
        }
    }

    Verdict::Clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::view::view_for;

    fn flagged_category(target: &str, level: SecurityLevel) -> Option<RuleCategory> {
        match inspect(&view_for(target), level) {
            Verdict::Flagged { category, .. } => Some(category),
            Verdict::Clean => None,
        }
    }

    #[test]
    fn union_select_flags_sql_injection() {
        let target = "/?id=1%20UNION%20SELECT%20*%20FROM%20users--";
        assert_eq!(
            flagged_category(target, SecurityLevel::Moderate),
            Some(RuleCategory::SqlInjection)
        );
        assert_eq!(
            flagged_category(target, SecurityLevel::Strict),
            Some(RuleCategory::SqlInjection)
        );
    }

    #[test]
    fn script_payload_flags_xss_not_sql() {
        let target = "/?q=%3Cscript%3Ealert(1)%3C/script%3E";
        for level in [SecurityLevel::Moderate, SecurityLevel::Strict] {
            assert_eq!(flagged_category(target, level), Some(RuleCategory::Xss));
        }
    }

    #[test]
    fn traversal_flags_at_every_level() {
        let target = "/static/../../etc/passwd";
        for level in [
            SecurityLevel::Relaxed,
            SecurityLevel::Moderate,
            SecurityLevel::Strict,
        ] {
            assert_eq!(
                flagged_category(target, level),
                Some(RuleCategory::PathTraversal),
                "level {level:?}"
            );
        }
    }

    #[test]
    fn first_match_wins_over_later_categories() {
        // Carries both a traversal sequence and a SQL tautology; traversal
        // is evaluated earlier and must be the reported reason.
        let target = "/files/../../etc/passwd?id=1%20OR%201=1";
        assert_eq!(
            flagged_category(target, SecurityLevel::Strict),
            Some(RuleCategory::PathTraversal)
        );
    }

    #[test]
    fn suspicious_headers_inactive_at_relaxed() {
        use axum::body::Body;
        use axum::http::Request;
        let request = Request::builder()
            .uri("/")
            .header("user-agent", "Mozilla/5.0")
            .header("X-Original-URL", "/admin")
            .body(Body::empty())
            .unwrap();
        let (parts, _) = request.into_parts();
        let view = RequestView::new(&parts, b"");

        assert_eq!(inspect(&view, SecurityLevel::Relaxed), Verdict::Clean);
        assert!(matches!(
            inspect(&view, SecurityLevel::Moderate),
            Verdict::Flagged {
                category: RuleCategory::SuspiciousHeader,
                ..
            }
        ));
    }

    #[test]
    fn missing_user_agent_only_flags_at_strict() {
        use axum::body::Body;
        use axum::http::Request;
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (parts, _) = request.into_parts();
        let view = RequestView::new(&parts, b"");

        assert_eq!(inspect(&view, SecurityLevel::Moderate), Verdict::Clean);
        assert!(matches!(
            inspect(&view, SecurityLevel::Strict),
            Verdict::Flagged {
                category: RuleCategory::SuspiciousUserAgent,
                ..
            }
        ));
    }

    #[test]
    fn clean_request_is_clean_everywhere() {
        for level in [
            SecurityLevel::Relaxed,
            SecurityLevel::Moderate,
            SecurityLevel::Strict,
        ] {
            assert_eq!(flagged_category("/products?page=3", level), None);
        }
    }

    #[test]
    fn body_is_inspected() {
        use axum::body::Body;
        use axum::http::Request;
        let request = Request::builder()
            .uri("/login")
            .method("POST")
            .header("user-agent", "Mozilla/5.0")
            .body(Body::empty())
            .unwrap();
        let (parts, _) = request.into_parts();
        let view = RequestView::new(&parts, b"username=admin' OR '1'='1&password=x");
        assert!(matches!(
            inspect(&view, SecurityLevel::Moderate),
            Verdict::Flagged {
                category: RuleCategory::SqlInjection,
                ..
            }
        ));
    }
}
