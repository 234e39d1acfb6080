use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;

use crate::admin::AdminState;
use crate::registry::{DomainConfig, RegistryError};
use crate::sink::store::{LogQuery, LogStats};
use crate::sink::SecurityLogEntry;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Deserialize, Default)]
pub struct LogParams {
    pub search: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Serialize)]
pub struct StatsSummary {
    pub total_requests: u64,
    pub blocked_requests: u64,
    pub total_domains: usize,
    pub active_domains: usize,
    pub logs: LogStats,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn list_domains(State(state): State<AdminState>) -> Json<Vec<DomainConfig>> {
    let domains = state
        .registry
        .list()
        .iter()
        .map(|d| (**d).clone())
        .collect();
    Json(domains)
}

pub async fn create_domain(
    State(state): State<AdminState>,
    Json(domain): Json<DomainConfig>,
) -> Response {
    match state.registry.insert(domain.clone()) {
        Ok(()) => {
            tracing::info!(domain = %domain.domain_name, "Domain registered");
            (StatusCode::CREATED, Json(domain)).into_response()
        }
        Err(e) => registry_error(e),
    }
}

pub async fn update_domain(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Json(domain): Json<DomainConfig>,
) -> Response {
    match state.registry.update(&name, domain.clone()) {
        Ok(()) => {
            tracing::info!(domain = %name, "Domain updated");
            Json(domain).into_response()
        }
        Err(e) => registry_error(e),
    }
}

pub async fn delete_domain(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Response {
    match state.registry.remove(&name) {
        Ok(()) => {
            tracing::info!(domain = %name, "Domain removed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => registry_error(e),
    }
}

pub async fn get_logs(
    State(state): State<AdminState>,
    Query(params): Query<LogParams>,
) -> Json<Vec<SecurityLogEntry>> {
    let query = LogQuery {
        search: params.search,
        reason: params.reason,
        limit: params.limit,
        offset: params.offset,
    };
    Json(state.sink.store().query(&query))
}

pub async fn export_logs(State(state): State<AdminState>) -> Response {
    let mut csv = String::from(
        "timestamp,client_ip,request_method,request_path,reason,severity,user_agent,details\n",
    );
    for entry in state.sink.store().export() {
        csv.push_str(&csv_row(&entry));
    }

    (
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"security_logs.csv\"",
            ),
        ],
        csv,
    )
        .into_response()
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<StatsSummary> {
    let (total_domains, active_domains) = state.registry.counts();
    Json(StatsSummary {
        total_requests: state.stats.total_requests.load(Ordering::Relaxed),
        blocked_requests: state.stats.blocked_requests.load(Ordering::Relaxed),
        total_domains,
        active_domains,
        logs: state.sink.store().stats(Utc::now(), 10),
    })
}

fn registry_error(e: RegistryError) -> Response {
    let status = match e {
        RegistryError::Duplicate(_) => StatusCode::CONFLICT,
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

fn csv_row(entry: &SecurityLogEntry) -> String {
    let fields = [
        entry.timestamp.to_rfc3339(),
        entry.client_ip.clone(),
        entry.request_method.clone(),
        entry.request_path.clone(),
        entry.reason.clone(),
        entry.severity.to_string(),
        entry.user_agent.clone().unwrap_or_default(),
        entry.details.clone(),
    ];
    let mut row = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            row.push(',');
        }
        row.push_str(&csv_escape(field));
    }
    row.push('\n');
    row
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
