//! Per-(domain, client) rate limiting over a rolling window.
//!
//! # Design Decisions
//! - Increment-then-compare: the counter always advances, even when the
//!   request is rejected, so sustained abuse keeps failing
//! - Counter store is pluggable: in-process dashmap or shared Redis
//! - Store unavailability fails closed unless fail-open is configured
//!   explicitly; a security product must not fail permissive by default

pub mod memory;
pub mod redis;

use std::time::Duration;
use thiserror::Error;

use crate::config::RateLimitConfig;
use self::memory::MemoryStore;
use self::redis::RedisStore;

/// Errors from the shared counter store.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("counter store error: {0}")]
    Store(#[from] ::redis::RedisError),
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Exceeded,
}

enum CounterStore {
    Memory(MemoryStore),
    Redis(RedisStore),
}

/// Rolling-window rate limiter keyed by `(domain, client_ip)`.
pub struct RateLimiter {
    store: CounterStore,
    fail_open: bool,
}

impl RateLimiter {
    /// Build the limiter from config, connecting to Redis when configured.
    pub async fn from_config(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let window = Duration::from_secs(config.window_secs);
        let store = match &config.redis_url {
            Some(url) => {
                let store = RedisStore::connect(url, window).await?;
                tracing::info!(url = %url, "Rate limit counters in Redis");
                CounterStore::Redis(store)
            }
            None => {
                tracing::info!("Rate limit counters in process memory");
                CounterStore::Memory(MemoryStore::new(window))
            }
        };
        Ok(Self {
            store,
            fail_open: config.fail_open,
        })
    }

    /// In-process limiter with an explicit window (tests, embedding).
    pub fn in_memory(window: Duration) -> Self {
        Self {
            store: CounterStore::Memory(MemoryStore::new(window)),
            fail_open: false,
        }
    }

    /// Check one request from `client_ip` against `domain`'s limit.
    pub async fn check(&self, domain: &str, client_ip: &str, limit: u32) -> RateDecision {
        let key = format!("rate:{domain}:{client_ip}");
        let count = match &self.store {
            CounterStore::Memory(store) => store.increment(&key),
            CounterStore::Redis(store) => match store.increment(&key).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::error!(error = %e, "Counter store unavailable");
                    metrics::counter!("waf_counter_store_errors_total").increment(1);
                    return if self.fail_open {
                        tracing::warn!("fail_open set: admitting request without a count");
                        RateDecision::Allowed
                    } else {
                        RateDecision::Exceeded
                    };
                }
            },
        };

        if count > limit as u64 {
            RateDecision::Exceeded
        } else {
            RateDecision::Allowed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sixth_request_exceeds_limit_of_five() {
        let limiter = RateLimiter::in_memory(Duration::from_secs(3600));
        for i in 1..=5 {
            assert_eq!(
                limiter.check("example.com", "1.2.3.4", 5).await,
                RateDecision::Allowed,
                "request {i}"
            );
        }
        assert_eq!(
            limiter.check("example.com", "1.2.3.4", 5).await,
            RateDecision::Exceeded
        );
        // Once over, it stays over within the window.
        assert_eq!(
            limiter.check("example.com", "1.2.3.4", 5).await,
            RateDecision::Exceeded
        );
    }

    #[tokio::test]
    async fn window_rollover_admits_again() {
        let limiter = RateLimiter::in_memory(Duration::from_millis(30));
        assert_eq!(
            limiter.check("d", "ip", 1).await,
            RateDecision::Allowed
        );
        assert_eq!(
            limiter.check("d", "ip", 1).await,
            RateDecision::Exceeded
        );
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(
            limiter.check("d", "ip", 1).await,
            RateDecision::Allowed
        );
    }

    #[tokio::test]
    async fn keys_are_scoped_per_domain_and_ip() {
        let limiter = RateLimiter::in_memory(Duration::from_secs(3600));
        assert_eq!(limiter.check("a.com", "ip", 1).await, RateDecision::Allowed);
        assert_eq!(limiter.check("a.com", "ip", 1).await, RateDecision::Exceeded);
        assert_eq!(limiter.check("b.com", "ip", 1).await, RateDecision::Allowed);
        assert_eq!(limiter.check("a.com", "other", 1).await, RateDecision::Allowed);
    }

    #[tokio::test]
    async fn concurrent_checks_never_admit_more_than_limit() {
        use std::sync::Arc;
        let limiter = Arc::new(RateLimiter::in_memory(Duration::from_secs(3600)));
        let limit = 10u32;
        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.check("example.com", "1.2.3.4", limit).await
            }));
        }
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() == RateDecision::Allowed {
                admitted += 1;
            }
        }
        assert_eq!(admitted, limit);
    }
}
