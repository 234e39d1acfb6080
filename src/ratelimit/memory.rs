//! In-process counter store.
//!
//! Counters live in a `DashMap`; the entry guard gives each key an
//! exclusive read-modify-write, so two concurrent requests for the same
//! `(domain, ip)` can never both observe the pre-increment count. Lock
//! granularity is per shard, never global.

use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Counter {
    count: u64,
    window_start: Instant,
}

/// Per-key rolling-window counters.
///
/// Stale counters are swept opportunistically from `increment`, at most
/// once per window length, so the map never grows without bound under a
/// churn of distinct keys.
pub struct MemoryStore {
    counters: DashMap<String, Counter>,
    window: Duration,
    last_sweep: Mutex<Instant>,
}

impl MemoryStore {
    pub fn new(window: Duration) -> Self {
        Self {
            counters: DashMap::new(),
            window,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Increment the counter for `key` and return the post-increment count.
    ///
    /// Creates the counter lazily; resets it when the window has elapsed.
    /// The increment is never reverted, so sustained abuse keeps counting.
    pub fn increment(&self, key: &str) -> u64 {
        let now = Instant::now();
        let count = {
            let mut entry = self
                .counters
                .entry(key.to_string())
                .or_insert_with(|| Counter {
                    count: 0,
                    window_start: now,
                });

            if now.duration_since(entry.window_start) >= self.window {
                entry.count = 1;
                entry.window_start = now;
            } else {
                entry.count += 1;
            }
            entry.count
        };
        // Entry guard is dropped before the sweep retains over the map.
        self.maybe_sweep(now);
        count
    }

    /// Drop counters whose window has fully elapsed, at most once per
    /// window. Correctness never depends on the sweep because `increment`
    /// resets stale windows itself; it only bounds the map's size.
    fn maybe_sweep(&self, now: Instant) {
        let due = match self.last_sweep.try_lock() {
            Ok(mut last) => {
                if now.duration_since(*last) >= self.window {
                    *last = now;
                    true
                } else {
                    false
                }
            }
            // Another thread is already deciding; skip.
            Err(_) => false,
        };
        if due {
            self.counters
                .retain(|_, c| now.duration_since(c.window_start) < self.window);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.counters.len()
    }
}
