//! Security log sink: durable, off-the-critical-path event recording.
//!
//! # Data Flow
//! ```text
//! pipeline (blocked request)
//!     → record(): bounded channel, one bounded retry, never waits longer
//!     → writer task: append JSONL + in-memory store
//!     → flush(): oneshot ack, awaited during graceful shutdown
//! ```
//!
//! The block decision is already final when `record` is called; a sink
//! failure is surfaced as an internal diagnostic, never as client latency.

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::Severity;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub use store::{LogQuery, LogStats, LogStore, ReasonCount};

/// One blocked/flagged request. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityLogEntry {
    pub timestamp: DateTime<Utc>,
    pub client_ip: String,
    pub request_method: String,
    pub request_path: String,
    /// Rule category name or "Rate Limit Exceeded".
    pub reason: String,
    pub severity: Severity,
    pub user_agent: Option<String>,
    pub details: String,
}

enum SinkCommand {
    Record(SecurityLogEntry),
    Flush(oneshot::Sender<()>),
}

const RECORD_RETRY_TIMEOUT: Duration = Duration::from_millis(100);

/// Cloneable handle to the sink. Queries read the shared store directly;
/// writes go through the channel to the writer task.
#[derive(Clone)]
pub struct SecurityLogSink {
    tx: mpsc::Sender<SinkCommand>,
    store: Arc<LogStore>,
}

impl SecurityLogSink {
    /// Spawn the writer task. When `path` is set, existing entries are
    /// reloaded into the store and new ones appended as JSON lines.
    pub fn spawn(path: Option<PathBuf>, channel_capacity: usize) -> (Self, JoinHandle<()>) {
        let store = Arc::new(LogStore::default());

        if let Some(path) = &path {
            match reload(path, &store) {
                Ok(0) => {}
                Ok(n) => tracing::info!(count = n, path = ?path, "Reloaded security log"),
                Err(e) => tracing::warn!(error = %e, path = ?path, "Could not reload security log"),
            }
        }

        let (tx, rx) = mpsc::channel(channel_capacity);
        let writer_store = store.clone();
        let handle = tokio::spawn(writer_loop(rx, writer_store, path));

        (Self { tx, store }, handle)
    }

    /// Record a blocked request.
    ///
    /// Tries a non-blocking send first, then one bounded retry. On failure
    /// the entry is dropped with an internal diagnostic; the caller's
    /// response is never delayed past the bound.
    pub async fn record(&self, entry: SecurityLogEntry) {
        match self.tx.try_send(SinkCommand::Record(entry)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                if let Err(e) = self.tx.send_timeout(command, RECORD_RETRY_TIMEOUT).await {
                    tracing::error!(error = %e, "Security log entry dropped: sink backlogged");
                    metrics::counter!("waf_log_entries_dropped_total").increment(1);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!("Security log entry dropped: sink closed");
                metrics::counter!("waf_log_entries_dropped_total").increment(1);
            }
        }
    }

    /// Wait until everything queued so far is written out.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(SinkCommand::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// The query/aggregate view used by the management interface.
    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }
}

async fn writer_loop(
    mut rx: mpsc::Receiver<SinkCommand>,
    store: Arc<LogStore>,
    path: Option<PathBuf>,
) {
    let mut file = match &path {
        Some(path) => match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::error!(error = %e, path = ?path, "Security log file unavailable; memory only");
                None
            }
        },
        None => None,
    };

    while let Some(command) = rx.recv().await {
        match command {
            SinkCommand::Record(entry) => {
                if let Some(file) = &mut file {
                    match serde_json::to_string(&entry) {
                        Ok(line) => {
                            if let Err(e) = writeln!(file, "{line}") {
                                tracing::error!(error = %e, "Security log append failed");
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Security log serialize failed"),
                    }
                }
                store.push(entry);
            }
            SinkCommand::Flush(ack) => {
                if let Some(file) = &mut file {
                    if let Err(e) = file.flush() {
                        tracing::error!(error = %e, "Security log flush failed");
                    }
                }
                let _ = ack.send(());
            }
        }
    }
    // Channel closed: final flush before the task exits.
    if let Some(file) = &mut file {
        let _ = file.flush();
    }
}

fn reload(path: &PathBuf, store: &Arc<LogStore>) -> std::io::Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(path)?;
    let mut count = 0;
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SecurityLogEntry>(line) {
            Ok(entry) => {
                store.push(entry);
                count += 1;
            }
            Err(e) => tracing::warn!(error = %e, "Skipping unparsable log line"),
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(reason: &str) -> SecurityLogEntry {
        SecurityLogEntry {
            timestamp: Utc::now(),
            client_ip: "203.0.113.9".to_string(),
            request_method: "GET".to_string(),
            request_path: "/".to_string(),
            reason: reason.to_string(),
            severity: Severity::High,
            user_agent: Some("curl/8".to_string()),
            details: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn record_then_flush_is_visible_in_store() {
        let (sink, _handle) = SecurityLogSink::spawn(None, 16);
        sink.record(entry("XSS")).await;
        sink.flush().await;
        assert_eq!(sink.store().len(), 1);
    }

    #[tokio::test]
    async fn file_round_trip_survives_restart() {
        let dir = std::env::temp_dir().join(format!("waf-sink-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("security.jsonl");

        {
            let (sink, handle) = SecurityLogSink::spawn(Some(path.clone()), 16);
            sink.record(entry("SQL Injection")).await;
            sink.record(entry("Rate Limit Exceeded")).await;
            sink.flush().await;
            drop(sink);
            handle.await.unwrap();
        }

        let (sink, _handle) = SecurityLogSink::spawn(Some(path), 16);
        assert_eq!(sink.store().len(), 2);
    }

    #[tokio::test]
    async fn record_after_writer_exit_drops_with_diagnostic() {
        let (sink, handle) = SecurityLogSink::spawn(None, 16);
        let survivor = sink.clone();
        drop(sink);
        handle.abort();
        let _ = handle.await;
        // Must return promptly and not panic even though the writer is gone.
        survivor.record(entry("XSS")).await;
    }
}
