//! HTTP server setup and request pipeline.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all pipeline handler
//! - Wire up middleware (tracing, request timeout)
//! - Resolve the domain from the Host header
//! - Enforce the per-domain rate limit
//! - Inspect the buffered request against the rule engine
//! - Forward clean requests to the domain's origin
//! - Observability (metrics, correlation IDs)

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::config::WafConfig;
use crate::observability::metrics;
use crate::proxy::forward::{self, ForwardError, HttpClient};
use crate::ratelimit::{RateDecision, RateLimiter};
use crate::registry::{DomainConfig, DomainRegistry};
use crate::rules::{self, RequestView, RuleCategory, Severity, Verdict, MAX_BODY_BYTES};
use crate::sink::{SecurityLogEntry, SecurityLogSink};

/// Rolling counters for the stats endpoint.
#[derive(Debug, Default)]
pub struct GatewayStats {
    pub total_requests: AtomicU64,
    pub blocked_requests: AtomicU64,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DomainRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub sink: SecurityLogSink,
    pub client: HttpClient,
    pub stats: Arc<GatewayStats>,
    pub config: Arc<WafConfig>,
}

/// Public-facing HTTP server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new server wired to the shared subsystems.
    pub fn new(
        config: Arc<WafConfig>,
        registry: Arc<DomainRegistry>,
        limiter: Arc<RateLimiter>,
        sink: SecurityLogSink,
        stats: Arc<GatewayStats>,
    ) -> Self {
        let client = forward::build_client(Duration::from_secs(config.timeouts.connect_secs));

        let state = AppState {
            registry,
            limiter,
            sink,
            client,
            stats,
            config: config.clone(),
        };

        let router = Self::build_router(&config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &WafConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(pipeline_handler))
            .route("/", any(pipeline_handler))
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main pipeline handler.
///
/// Resolve, rate-limit, inspect, forward. The first stage that refuses
/// the request answers for it; later stages never run.
async fn pipeline_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> impl IntoResponse {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method_str = request.method().to_string();
    let path = request.uri().path().to_string();

    // 1. Resolve the domain from the Host header.
    let host = request
        .headers()
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let domain = match state.registry.resolve(host) {
        Some(d) => d,
        None => {
            tracing::debug!(request_id = %request_id, host = %host, "Unknown host");
            metrics::record_request(&method_str, 404, "none", start_time);
            return refusal(StatusCode::NOT_FOUND, "Not Found");
        }
    };

    state.stats.total_requests.fetch_add(1, Ordering::Relaxed);

    let client_ip = client_ip(&request, addr);

    tracing::debug!(
        request_id = %request_id,
        method = %method_str,
        path = %path,
        domain = %domain.domain_name,
        client_ip = %client_ip,
        "Processing request"
    );

    // 2. Rate limit per (domain, client IP).
    let decision = state
        .limiter
        .check(&domain.domain_name, &client_ip, domain.rate_limit)
        .await;

    if decision == RateDecision::Exceeded {
        tracing::warn!(
            request_id = %request_id,
            domain = %domain.domain_name,
            client_ip = %client_ip,
            limit = domain.rate_limit,
            "Rate limit exceeded"
        );
        let entry = SecurityLogEntry {
            timestamp: Utc::now(),
            client_ip: client_ip.clone(),
            request_method: method_str.clone(),
            request_path: path.clone(),
            reason: "Rate Limit Exceeded".to_string(),
            severity: Severity::Medium,
            user_agent: header_string(&request, "user-agent"),
            details: format!("more than {} requests in the window", domain.rate_limit),
        };
        return block(&state, entry, &method_str, &domain, 429, start_time).await;
    }

    // 3. Buffer the body and inspect.
    let user_agent = header_string(&request, "user-agent");
    let (parts, body) = request.into_parts();

    let body_bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES as usize).await {
        Ok(bytes) => bytes,
        Err(_) => {
            // Over the cap or the client aborted mid-body.
            let entry = SecurityLogEntry {
                timestamp: Utc::now(),
                client_ip: client_ip.clone(),
                request_method: method_str.clone(),
                request_path: path.clone(),
                reason: RuleCategory::MalformedRequest.to_string(),
                severity: RuleCategory::MalformedRequest.severity(),
                user_agent,
                details: format!("request body exceeds {MAX_BODY_BYTES} bytes"),
            };
            return block(&state, entry, &method_str, &domain, 403, start_time).await;
        }
    };

    let view = RequestView::new(&parts, &body_bytes);
    if let Verdict::Flagged { category, details } = rules::inspect(&view, domain.security_level) {
        tracing::warn!(
            request_id = %request_id,
            domain = %domain.domain_name,
            client_ip = %client_ip,
            category = %category,
            details = %details,
            "Request blocked"
        );
        let entry = SecurityLogEntry {
            timestamp: Utc::now(),
            client_ip: client_ip.clone(),
            request_method: method_str.clone(),
            request_path: path.clone(),
            reason: category.to_string(),
            severity: category.severity(),
            user_agent,
            details,
        };
        return block(&state, entry, &method_str, &domain, 403, start_time).await;
    }

    // 4. Forward to the origin.
    match forward::forward(
        &state.client,
        &parts,
        &body_bytes,
        &domain.target_url,
        &client_ip,
        &request_id,
        &state.config.timeouts,
        &state.config.upstream,
    )
    .await
    {
        Ok(response) => {
            let status = response.status().as_u16();
            metrics::record_request(&method_str, status, &domain.domain_name, start_time);
            response.into_response()
        }
        Err(ForwardError::Timeout) => {
            tracing::error!(
                request_id = %request_id,
                domain = %domain.domain_name,
                "Upstream timed out"
            );
            metrics::record_request(&method_str, 504, &domain.domain_name, start_time);
            refusal(StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout")
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                domain = %domain.domain_name,
                error = %e,
                "Upstream request failed"
            );
            metrics::record_request(&method_str, 502, &domain.domain_name, start_time);
            refusal(StatusCode::BAD_GATEWAY, "Bad Gateway")
        }
    }
}

/// Record the security event, bump counters, and answer with a generic
/// refusal that leaks nothing about which check fired.
async fn block(
    state: &AppState,
    entry: SecurityLogEntry,
    method: &str,
    domain: &DomainConfig,
    status: u16,
    start_time: Instant,
) -> Response {
    state.stats.blocked_requests.fetch_add(1, Ordering::Relaxed);
    metrics::record_blocked(&entry.reason);
    metrics::record_request(method, status, &domain.domain_name, start_time);
    state.sink.record(entry).await;

    match status {
        429 => refusal(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"),
        _ => refusal(StatusCode::FORBIDDEN, "Forbidden"),
    }
}

fn refusal(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

/// First hop of X-Forwarded-For when present, otherwise the peer address.
fn client_ip(request: &Request<Body>, peer: SocketAddr) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

fn header_string(request: &Request<Body>, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_xff(value: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header("x-forwarded-for", v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let peer: SocketAddr = "192.0.2.1:5000".parse().unwrap();
        let request = request_with_xff(Some("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&request, peer), "203.0.113.7");
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let peer: SocketAddr = "192.0.2.1:5000".parse().unwrap();
        assert_eq!(client_ip(&request_with_xff(None), peer), "192.0.2.1");
        assert_eq!(client_ip(&request_with_xff(Some("")), peer), "192.0.2.1");
    }
}
