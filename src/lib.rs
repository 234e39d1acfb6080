//! Web application firewall reverse proxy.
//!
//! Sits in front of protected domains, inspects every request against a
//! rule engine, enforces per-client rate limits, and forwards clean
//! traffic to each domain's origin.

// Core subsystems
pub mod config;
pub mod proxy;
pub mod registry;
pub mod rules;

// Enforcement
pub mod ratelimit;
pub mod sink;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::{load_config, WafConfig};
pub use lifecycle::Shutdown;
pub use proxy::HttpServer;
pub use registry::{DomainConfig, DomainRegistry};
pub use rules::SecurityLevel;
