//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use waf_proxy::config::WafConfig;
use waf_proxy::lifecycle::Shutdown;
use waf_proxy::proxy::{GatewayStats, HttpServer};
use waf_proxy::ratelimit::RateLimiter;
use waf_proxy::registry::{DomainConfig, DomainRegistry};
use waf_proxy::rules::SecurityLevel;
use waf_proxy::sink::SecurityLogSink;

/// Start a simple mock origin that returns a fixed 200 body.
/// Returns the address it bound to.
pub async fn start_mock_origin(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a programmable mock origin with async support.
#[allow(dead_code)]
pub async fn start_programmable_origin<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start an origin that accepts connections but never answers.
#[allow(dead_code)]
pub async fn start_black_hole_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(async move {
                        // Hold the connection open without responding.
                        tokio::time::sleep(Duration::from_secs(120)).await;
                        drop(socket);
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Everything a test needs to talk to a running gateway.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub registry: Arc<DomainRegistry>,
    pub sink: SecurityLogSink,
    pub stats: Arc<GatewayStats>,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
pub fn domain(name: &str, target: SocketAddr, level: SecurityLevel, limit: u32) -> DomainConfig {
    DomainConfig {
        domain_name: name.to_string(),
        target_url: format!("http://{}", target),
        security_level: level,
        rate_limit: limit,
        is_active: true,
    }
}

/// Boot a gateway on an ephemeral port with an in-memory counter store.
pub async fn start_gateway(config: WafConfig, domains: Vec<DomainConfig>) -> TestGateway {
    let config = Arc::new(config);
    let registry = Arc::new(DomainRegistry::new(domains, None));
    let limiter = Arc::new(RateLimiter::in_memory(Duration::from_secs(
        config.rate_limit.window_secs,
    )));
    let (sink, _writer) = SecurityLogSink::spawn(None, config.security_log.channel_capacity);
    let stats = Arc::new(GatewayStats::default());
    let shutdown = Shutdown::new();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(
        config,
        registry.clone(),
        limiter,
        sink.clone(),
        stats.clone(),
    );
    let rx: broadcast::Receiver<()> = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    // Give the acceptor a beat to come up.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestGateway {
        addr,
        registry,
        sink,
        stats,
        shutdown,
    }
}

/// Non-pooled client so each request sees current gateway state.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
