//! Suspicious User-Agent check.
//!
//! Substring match against known scanner and attack-tool agents. At the
//! strict level a missing User-Agent is itself suspicious: browsers and
//! legitimate API clients always send one.

use crate::rules::view::RequestView;

const SCANNER_AGENTS: &[&str] = &[
    "sqlmap", "nikto", "nmap", "masscan", "zap", "burp", "metasploit",
    "acunetix", "nessus", "dirbuster", "wpscan", "hydra", "havij",
];

pub fn check(view: &RequestView, require_present: bool) -> Option<String> {
    match view.user_agent.as_deref() {
        Some(agent) => SCANNER_AGENTS
            .iter()
            .find(|needle| agent.contains(*needle))
            .map(|needle| format!("scanner user agent '{needle}'")),
        None if require_present => Some("missing user agent".to_string()),
        None => None,
    }
}
