//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → WafConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On domains file change:
//!     watcher.rs detects change
//!     → registry parses the new table
//!     → atomic snapshot swap
//!     → new requests observe the new table
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the domain table hot-reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::WafConfig;
pub use schema::ListenerConfig;
pub use schema::TimeoutConfig;
pub use schema::UpstreamConfig;
pub use schema::RateLimitConfig;
pub use schema::SecurityLogConfig;
pub use schema::AdminConfig;
pub use schema::ObservabilityConfig;
pub use loader::{load_config, ConfigError};
