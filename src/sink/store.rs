//! In-memory view of the security log, backing the read contract.
//!
//! The management interface is the only reader. Aggregates are derived on
//! demand; nothing is stored redundantly.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::sink::SecurityLogEntry;

/// Query parameters for log reads.
#[derive(Debug, Default)]
pub struct LogQuery {
    /// Free-text match over client ip, path, and method.
    pub search: Option<String>,
    /// Exact reason filter.
    pub reason: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Derived aggregates over the retained log.
#[derive(Debug, serde::Serialize)]
pub struct LogStats {
    pub total_entries: usize,
    pub entries_last_24h: usize,
    pub by_reason: Vec<ReasonCount>,
}

#[derive(Debug, serde::Serialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

/// Append-only, internally synchronized entry store.
#[derive(Default)]
pub struct LogStore {
    entries: RwLock<Vec<SecurityLogEntry>>,
}

impl LogStore {
    pub fn push(&self, entry: SecurityLogEntry) {
        self.entries
            .write()
            .expect("log store lock poisoned")
            .push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("log store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Newest-first page of entries matching the query.
    pub fn query(&self, query: &LogQuery) -> Vec<SecurityLogEntry> {
        let entries = self.entries.read().expect("log store lock poisoned");
        let needle = query.search.as_ref().map(|s| s.to_ascii_lowercase());
        let limit = if query.limit == 0 { 100 } else { query.limit };

        entries
            .iter()
            .rev()
            .filter(|e| match &needle {
                Some(n) => {
                    e.client_ip.to_ascii_lowercase().contains(n)
                        || e.request_path.to_ascii_lowercase().contains(n)
                        || e.request_method.to_ascii_lowercase().contains(n)
                }
                None => true,
            })
            .filter(|e| match &query.reason {
                Some(reason) => &e.reason == reason,
                None => true,
            })
            .skip(query.offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// All retained entries, oldest first (CSV export).
    pub fn export(&self) -> Vec<SecurityLogEntry> {
        self.entries
            .read()
            .expect("log store lock poisoned")
            .clone()
    }

    /// Aggregate counts, with `by_reason` sorted descending and truncated
    /// to `top_n`.
    pub fn stats(&self, now: DateTime<Utc>, top_n: usize) -> LogStats {
        let entries = self.entries.read().expect("log store lock poisoned");
        let cutoff = now - Duration::hours(24);

        let mut by_reason: HashMap<&str, usize> = HashMap::new();
        let mut recent = 0usize;
        for entry in entries.iter() {
            *by_reason.entry(entry.reason.as_str()).or_default() += 1;
            if entry.timestamp >= cutoff {
                recent += 1;
            }
        }

        let mut by_reason: Vec<ReasonCount> = by_reason
            .into_iter()
            .map(|(reason, count)| ReasonCount {
                reason: reason.to_string(),
                count,
            })
            .collect();
        by_reason.sort_by(|a, b| b.count.cmp(&a.count).then(a.reason.cmp(&b.reason)));
        by_reason.truncate(top_n);

        LogStats {
            total_entries: entries.len(),
            entries_last_24h: recent,
            by_reason,
        }
    }
}
