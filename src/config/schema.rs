//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the firewall.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::registry::DomainConfig;

/// Root configuration for the WAF proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WafConfig {
    /// Listener configuration (public-facing bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Upstream forwarding behaviour.
    pub upstream: UpstreamConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Security log sink settings.
    pub security_log: SecurityLogConfig,

    /// Management interface settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Path to the persisted domain table. When set, the registry loads
    /// from it at startup, persists CRUD changes back to it, and the
    /// watcher reloads it on external edits.
    pub domains_file: Option<PathBuf>,

    /// Inline domain definitions, merged under entries from `domains_file`.
    pub domains: Vec<DomainConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Upstream response timeout (full round trip) in seconds.
    pub upstream_secs: u64,

    /// Total request timeout at the listener in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 60,
        }
    }
}

/// Upstream forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Retry a failed forward once after a short backoff.
    pub retry_enabled: bool,

    /// Base delay for the retry backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum delay for the retry backoff in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            retry_enabled: true,
            backoff_base_ms: 100,
            backoff_max_ms: 1000,
        }
    }
}

/// Rate limiting configuration.
///
/// Per-domain limits live in [`DomainConfig::rate_limit`]; this section
/// configures the counter store shared by all domains.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Rolling window length in seconds.
    pub window_secs: u64,

    /// Redis URL for the shared counter store. When unset, counters are
    /// kept in process memory.
    pub redis_url: Option<String>,

    /// Allow traffic through when the counter store is unreachable.
    /// Fail-closed is the default; this must be an explicit choice.
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 3600,
            redis_url: None,
            fail_open: false,
        }
    }
}

/// Security log sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityLogConfig {
    /// Append-only JSONL file for blocked-request records. When unset,
    /// entries are retained in memory only.
    pub path: Option<PathBuf>,

    /// Capacity of the writer channel between request handlers and the
    /// sink task.
    pub channel_capacity: usize,
}

impl Default for SecurityLogConfig {
    fn default() -> Self {
        Self {
            path: None,
            channel_capacity: 1024,
        }
    }
}

/// Management interface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the management API.
    pub enabled: bool,

    /// Shared admin credential (Bearer token).
    pub api_key: String,

    /// Management API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
