//! Management interface.
//!
//! Bound separately from the public listener and guarded by a Bearer
//! credential. Everything here reads or mutates shared state; nothing in
//! the request pipeline depends on this module.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use std::sync::Arc;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::proxy::GatewayStats;
use crate::registry::DomainRegistry;
use crate::sink::SecurityLogSink;

/// State shared by all management handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<DomainRegistry>,
    pub sink: SecurityLogSink,
    pub stats: Arc<GatewayStats>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/domains", get(list_domains).post(create_domain))
        .route(
            "/admin/domains/{name}",
            put(update_domain).delete(delete_domain),
        )
        .route("/admin/logs", get(get_logs))
        .route("/admin/logs/export", get(export_logs))
        .route("/admin/stats", get(get_stats))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
