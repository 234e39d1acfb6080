//! Resilience primitives for upstream forwarding.

pub mod backoff;

pub use backoff::retry_backoff;
