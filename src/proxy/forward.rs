//! Upstream forwarding.
//!
//! Rebuilds the inspected request against the origin's authority, strips
//! hop-by-hop headers in both directions, and bounds the round trip with
//! the configured timeouts. A transport failure is retried at most once
//! after a jittered backoff; a timeout is never retried.

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderValue, Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use thiserror::Error;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::resilience::retry_backoff;

pub type HttpClient = Client<HttpConnector, Body>;

/// Why a forward failed. Maps to 502 (transport/config) or 504 (timeout).
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream timed out")]
    Timeout,
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("unusable target url '{0}'")]
    BadTarget(String),
}

/// Headers that are connection-scoped and must not traverse the proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Build the upstream client with a bounded connect timeout.
pub fn build_client(connect_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Forward the buffered request to `target_url` and return the origin's
/// response with hop-by-hop headers removed.
#[allow(clippy::too_many_arguments)]
pub async fn forward(
    client: &HttpClient,
    parts: &Parts,
    body: &Bytes,
    target_url: &str,
    client_ip: &str,
    request_id: &str,
    timeouts: &TimeoutConfig,
    upstream: &UpstreamConfig,
) -> Result<Response<Body>, ForwardError> {
    let authority = authority_of(target_url)?;
    let uri = rebuild_uri(parts, &authority, target_url)?;

    let max_attempts = if upstream.retry_enabled { 2 } else { 1 };
    let mut attempts = 0;

    loop {
        attempts += 1;

        let request = build_request(parts, body, &uri, &authority, client_ip, request_id)?;

        let response = tokio::time::timeout(
            Duration::from_secs(timeouts.upstream_secs),
            client.request(request),
        )
        .await;

        match response {
            Ok(Ok(response)) => {
                let (mut head, body) = response.into_parts();
                for name in HOP_BY_HOP {
                    head.headers.remove(*name);
                }
                return Ok(Response::from_parts(head, Body::new(body)));
            }
            Ok(Err(e)) => {
                if attempts < max_attempts {
                    let backoff = retry_backoff(attempts, upstream);
                    tracing::info!(
                        request_id = %request_id,
                        attempt = attempts,
                        delay = ?backoff,
                        error = %e,
                        "Retrying after upstream transport error"
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                return Err(ForwardError::Transport(e.to_string()));
            }
            // A timed-out request may have reached the origin; never replay it.
            Err(_) => return Err(ForwardError::Timeout),
        }
    }
}

fn authority_of(target_url: &str) -> Result<Authority, ForwardError> {
    let target: Uri = target_url
        .parse()
        .map_err(|_| ForwardError::BadTarget(target_url.to_string()))?;
    target
        .authority()
        .cloned()
        .ok_or_else(|| ForwardError::BadTarget(target_url.to_string()))
}

fn rebuild_uri(
    parts: &Parts,
    authority: &Authority,
    target_url: &str,
) -> Result<Uri, ForwardError> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority.clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(|_| ForwardError::BadTarget(target_url.to_string()))
}

fn build_request(
    parts: &Parts,
    body: &Bytes,
    uri: &Uri,
    authority: &Authority,
    client_ip: &str,
    request_id: &str,
) -> Result<Request<Body>, ForwardError> {
    let mut builder = Request::builder()
        .method(parts.method.clone())
        .uri(uri.clone())
        .version(parts.version);

    if let Some(headers) = builder.headers_mut() {
        for (name, value) in parts.headers.iter() {
            if HOP_BY_HOP.contains(&name.as_str()) || name == "host" {
                continue;
            }
            headers.insert(name.clone(), value.clone());
        }
        if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
            headers.insert("host", host);
        }
        let forwarded_for = match parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            Some(existing) => format!("{existing}, {client_ip}"),
            None => client_ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert("x-forwarded-for", value);
        }
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert("x-request-id", value);
        }
    }

    builder
        .body(Body::from(body.clone()))
        .map_err(|e| ForwardError::Transport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;
    use std::str::FromStr;

    fn parts_for(uri: &str) -> Parts {
        let request = HttpRequest::builder()
            .uri(uri)
            .header("host", "public.example")
            .header("connection", "keep-alive")
            .header("x-secret", "1")
            .body(Body::empty())
            .unwrap();
        request.into_parts().0
    }

    #[test]
    fn uri_keeps_path_and_query_with_target_authority() {
        let parts = parts_for("/search?q=x");
        let authority = authority_of("http://10.0.0.5:3000").unwrap();
        let uri = rebuild_uri(&parts, &authority, "http://10.0.0.5:3000").unwrap();
        assert_eq!(uri.to_string(), "http://10.0.0.5:3000/search?q=x");
    }

    #[test]
    fn hop_by_hop_and_host_are_replaced() {
        let parts = parts_for("/");
        let authority = Authority::from_str("backend:8000").unwrap();
        let uri = rebuild_uri(&parts, &authority, "http://backend:8000").unwrap();
        let request = build_request(
            &parts,
            &Bytes::new(),
            &uri,
            &authority,
            "203.0.113.9",
            "req-1",
        )
        .unwrap();

        assert!(request.headers().get("connection").is_none());
        assert_eq!(request.headers()["host"], "backend:8000");
        assert_eq!(request.headers()["x-forwarded-for"], "203.0.113.9");
        assert_eq!(request.headers()["x-secret"], "1");
    }

    #[test]
    fn target_without_authority_is_rejected() {
        assert!(matches!(
            authority_of("not a url"),
            Err(ForwardError::BadTarget(_))
        ));
    }
}
