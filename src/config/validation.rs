//! Configuration validation.
//!
//! Semantic checks on top of what serde enforces syntactically. Pure
//! function over the config; returns every error found, not just the first,
//! so an operator can fix a config file in one pass.

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::WafConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}': {1}")]
    BindAddress(String, String),
    #[error("duplicate domain '{0}'")]
    DuplicateDomain(String),
    #[error("domain '{0}' has an empty name")]
    EmptyDomainName(String),
    #[error("domain '{0}': unparsable target_url '{1}'")]
    TargetUrl(String, String),
    #[error("domain '{0}': rate_limit must be positive")]
    ZeroRateLimit(String),
    #[error("rate_limit.window_secs must be positive")]
    ZeroWindow,
    #[error("security_log.channel_capacity must be positive")]
    ZeroChannelCapacity,
    #[error("admin interface enabled with the placeholder api_key")]
    PlaceholderAdminKey,
}

/// Validate the full configuration, collecting all errors.
pub fn validate_config(config: &WafConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (label, addr) in [
        ("listener.bind_address", &config.listener.bind_address),
        ("admin.bind_address", &config.admin.bind_address),
        (
            "observability.metrics_address",
            &config.observability.metrics_address,
        ),
    ] {
        if let Err(e) = addr.parse::<SocketAddr>() {
            errors.push(ValidationError::BindAddress(
                format!("{label} = {addr}"),
                e.to_string(),
            ));
        }
    }

    let mut seen = HashSet::new();
    for domain in &config.domains {
        let name = domain.domain_name.trim().to_ascii_lowercase();
        if name.is_empty() {
            errors.push(ValidationError::EmptyDomainName(domain.target_url.clone()));
            continue;
        }
        if !seen.insert(name.clone()) {
            errors.push(ValidationError::DuplicateDomain(name.clone()));
        }
        match Url::parse(&domain.target_url) {
            Ok(url) if url.host_str().is_some() => {}
            _ => errors.push(ValidationError::TargetUrl(
                name.clone(),
                domain.target_url.clone(),
            )),
        }
        if domain.rate_limit == 0 {
            errors.push(ValidationError::ZeroRateLimit(name));
        }
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if config.security_log.channel_capacity == 0 {
        errors.push(ValidationError::ZeroChannelCapacity);
    }
    if config.admin.enabled && config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
        errors.push(ValidationError::PlaceholderAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
