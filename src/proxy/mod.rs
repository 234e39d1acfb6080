//! Public-facing proxy pipeline.

pub mod forward;
pub mod server;

pub use forward::{build_client, ForwardError, HttpClient};
pub use server::{AppState, GatewayStats, HttpServer};
