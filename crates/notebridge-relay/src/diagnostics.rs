//! Diagnostics
//!
//! Every relay diagnostic goes to `tracing`. When an embedder also wants to
//! show them (a log panel inside the component), it plugs in a
//! `DiagnosticSink`; `MemoryLog` is the stock one.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Side-effect only; implementations must not panic.
pub trait DiagnosticSink: Send + Sync {
    fn info(&self, message: &str, data: Option<&Value>);
    fn error(&self, message: &str, data: Option<&Value>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Attached data, serialized
    pub data: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Records diagnostics in memory.
#[derive(Default, Clone)]
pub struct MemoryLog {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// Flattened display lines: each message, followed by its data if any.
    pub fn lines(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            lines.push(entry.message.clone());
            if let Some(data) = &entry.data {
                lines.push(data.clone());
            }
        }
        lines
    }

    pub fn errors(&self) -> Vec<LogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.level == LogLevel::Error)
            .cloned()
            .collect()
    }

    fn record(&self, level: LogLevel, message: &str, data: Option<&Value>) {
        self.entries.write().push(LogEntry {
            level,
            message: message.to_string(),
            data: data.map(Value::to_string),
            recorded_at: Utc::now(),
        });
    }
}

impl DiagnosticSink for MemoryLog {
    fn info(&self, message: &str, data: Option<&Value>) {
        self.record(LogLevel::Info, message, data);
    }

    fn error(&self, message: &str, data: Option<&Value>) {
        self.record(LogLevel::Error, message, data);
    }
}

/// Fans diagnostics out to `tracing` and the optional sink.
#[derive(Clone, Default)]
pub(crate) struct Diagnostics {
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl Diagnostics {
    pub(crate) fn new(sink: Option<Arc<dyn DiagnosticSink>>) -> Self {
        Self { sink }
    }

    pub(crate) fn info(&self, message: &str, data: Option<&Value>) {
        match data {
            Some(data) => tracing::info!(%data, "{}", message),
            None => tracing::info!("{}", message),
        }
        if let Some(sink) = &self.sink {
            sink.info(message, data);
        }
    }

    pub(crate) fn error(&self, message: &str, data: Option<&Value>) {
        match data {
            Some(data) => tracing::error!(%data, "{}", message),
            None => tracing::error!("{}", message),
        }
        if let Some(sink) = &self.sink {
            sink.error(message, data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_log_lines() {
        let log = MemoryLog::new();
        log.info("Posting message:", Some(&json!({ "action": "save-items" })));
        log.error("Invalid data received. Skipping...", None);

        assert_eq!(
            log.lines(),
            vec![
                "Posting message:".to_string(),
                r#"{"action":"save-items"}"#.to_string(),
                "Invalid data received. Skipping...".to_string(),
            ]
        );
        assert_eq!(log.errors().len(), 1);
    }

    #[test]
    fn test_diagnostics_forward_to_sink() {
        let log = MemoryLog::new();
        let diagnostics = Diagnostics::new(Some(Arc::new(log.clone())));

        diagnostics.info("hello", None);
        diagnostics.error("fatal: boom", None);

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[1].level, LogLevel::Error);
    }
}
