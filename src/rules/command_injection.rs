//! Command injection detection.
//!
//! A bare shell metacharacter or a bare binary name is not enough on its
//! own; every pattern requires a metacharacter adjacent to a command token
//! to keep false positives down on prose-like query values.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::view::RequestView;
use crate::rules::SecurityLevel;

const COMMANDS: &str = "cat|ls|pwd|whoami|id|uname|ps|netstat|ifconfig|rm|mv|cp|chmod|chown|kill|wget|curl|nc|netcat|telnet|ssh|bash|sh|cmd|powershell|python|perl|ruby";

static CORE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Separator followed by a command name: "; cat /etc/passwd".
        Regex::new(&format!(r"(?i)[;|&]\s*(?:{COMMANDS})\b")).unwrap(),
        // Command substitution.
        Regex::new(&format!(r"(?i)\$\(\s*(?:{COMMANDS})\b")).unwrap(),
        Regex::new(&format!(r"(?i)`\s*(?:{COMMANDS})\b")).unwrap(),
    ]
});

static BROAD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Newline-separated command (decoded %0a).
        Regex::new(&format!(r"(?i)\n\s*(?:{COMMANDS})\b")).unwrap(),
        // Pipe into an interpreter regardless of the producer.
        Regex::new(r"(?i)\|\s*(?:sh|bash|python|perl)\b").unwrap(),
        // ${IFS} whitespace evasion.
        Regex::new(r"(?i)\$\{ifs\}").unwrap(),
        // Arbitrary substitution or chained command at strict.
        Regex::new(r"\$\(").unwrap(),
        Regex::new(&format!(r"(?i)&&\s*(?:{COMMANDS})\b")).unwrap(),
    ]
});

pub fn check(view: &RequestView, level: SecurityLevel) -> Option<String> {
    let haystacks = [view.target.as_str(), view.body_text.as_str()];

    for text in haystacks {
        if let Some(pattern) = CORE_PATTERNS.iter().find(|p| p.is_match(text)) {
            return Some(format!("shell command matched '{pattern}'"));
        }
        if level == SecurityLevel::Strict {
            if let Some(pattern) = BROAD_PATTERNS.iter().find(|p| p.is_match(text)) {
                return Some(format!("shell metacharacters matched '{pattern}'"));
            }
        }
    }
    None
}
