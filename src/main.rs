//! Web application firewall reverse proxy.
//!
//! ```text
//!                          ┌───────────────────────────────────────────┐
//!                          │                 WAF PROXY                  │
//!                          │                                            │
//!   Client Request         │  ┌─────────┐   ┌──────────┐   ┌────────┐  │
//!   ───────────────────────┼─▶│ registry│──▶│ratelimit │──▶│ rules  │  │
//!                          │  │ resolve │   │  check   │   │inspect │  │
//!                          │  └─────────┘   └──────────┘   └───┬────┘  │
//!                          │                                   │       │
//!                          │        blocked ──▶ sink           ▼       │
//!   Client Response        │  ┌──────────────────────────┐ ┌────────┐  │
//!   ◀──────────────────────┼──│        response          │◀│forward │◀─┼── Origin
//!                          │  └──────────────────────────┘ └────────┘  │
//!                          │                                            │
//!                          │  config · admin · observability · lifecycle│
//!                          └───────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waf_proxy::admin::{setup_admin_router, AdminState};
use waf_proxy::config::{load_config, WafConfig};
use waf_proxy::config::watcher::DomainsWatcher;
use waf_proxy::lifecycle::Shutdown;
use waf_proxy::proxy::{GatewayStats, HttpServer};
use waf_proxy::ratelimit::RateLimiter;
use waf_proxy::registry::DomainRegistry;
use waf_proxy::sink::SecurityLogSink;

#[derive(Parser)]
#[command(name = "waf-proxy", version, about = "Web application firewall reverse proxy")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WafConfig::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("waf_proxy={},tower_http=info", config.observability.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "waf-proxy starting");

    let config = Arc::new(config);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        domains = config.domains.len(),
        window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    // Metrics endpoint.
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => waf_proxy::observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Domain registry, persisted when a domains file is configured.
    let registry = match &config.domains_file {
        Some(path) => Arc::new(DomainRegistry::load(path.clone(), config.domains.clone())?),
        None => Arc::new(DomainRegistry::new(config.domains.clone(), None)),
    };
    let (total, active) = registry.counts();
    tracing::info!(total, active, "Domain registry loaded");

    // Hot reload of the domains file. The watcher handle must stay alive.
    let mut _watcher = None;
    if let Some(path) = &config.domains_file {
        let (watcher, mut reload_rx) = DomainsWatcher::new(path);
        _watcher = Some(watcher.run()?);
        let registry = registry.clone();
        tokio::spawn(async move {
            while let Some(domains) = reload_rx.recv().await {
                let count = domains.len();
                registry.replace_all(domains);
                tracing::info!(domains = count, "Domain table reloaded");
            }
        });
    }

    // Counter store for rate limiting.
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit).await?);

    // Security log sink.
    let (sink, _writer) = SecurityLogSink::spawn(
        config.security_log.path.clone(),
        config.security_log.channel_capacity,
    );

    let stats = Arc::new(GatewayStats::default());
    let shutdown = Shutdown::new();
    shutdown.listen_for_ctrl_c();

    // Management interface on its own listener.
    if config.admin.enabled {
        let admin_state = AdminState {
            registry: registry.clone(),
            sink: sink.clone(),
            stats: stats.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        };
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %config.admin.bind_address, "Admin API starting");
        let router = setup_admin_router(admin_state);
        let mut admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let result = axum::serve(admin_listener, router)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API server error");
            }
        });
    }

    // Public-facing server.
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(
        config.clone(),
        registry,
        limiter,
        sink.clone(),
        stats,
    );
    server.run(listener, shutdown.subscribe()).await?;

    // Drain pending log entries before exit.
    sink.flush().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
