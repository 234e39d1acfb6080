//! Observability: structured logging and metrics.

pub mod metrics;
