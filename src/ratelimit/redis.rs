//! Redis-backed counter store.
//!
//! A single INCR is the atomic read-modify-write; EXPIRE is set only when
//! the returned count is 1, which anchors the rolling window at the first
//! request and lets Redis expire the key one window-length later.

use redis::AsyncCommands;
use std::time::Duration;

use crate::ratelimit::RateLimitError;

/// Shared counter store backed by Redis.
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
    window: Duration,
}

impl RedisStore {
    /// Connect to the counter store. Fails fast at startup rather than on
    /// the first request.
    pub async fn connect(url: &str, window: Duration) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_tokio_connection_manager().await?;
        Ok(Self { conn, window })
    }

    /// Increment the counter for `key` and return the post-increment count.
    pub async fn increment(&self, key: &str) -> Result<u64, RateLimitError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1u64).await?;
        if count == 1 {
            conn.expire::<_, ()>(key, self.window.as_secs() as usize)
                .await?;
        }
        Ok(count)
    }
}
