//! Log sinks: destinations for rendered audit lines
//!
//! Transport, rotation and storage live behind this trait. A sink must
//! be cheap to call from many tasks at once.

use crate::error::{AuditError, Result};
use std::sync::Mutex;

/// Tracing target used by [`TracingSink`]
pub const AUDIT_TARGET: &str = "audit";

/// Destination for rendered audit lines
pub trait LogSink: Send + Sync {
    /// Append one rendered line
    fn append(&self, line: &str) -> Result<()>;
}

/// Emits each line as an `info` event on the `audit` target
///
/// Route it with a subscriber filter such as `audit=info` to send audit
/// lines to their own file or collector.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append(&self, line: &str) -> Result<()> {
        tracing::info!(target: AUDIT_TARGET, "{}", line);
        Ok(())
    }
}

/// Collects lines in memory, optionally bounded
///
/// Mainly for tests; when `max_lines` is reached further appends fail
/// instead of dropping silently.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    max_lines: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(max_lines: usize) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            max_lines: Some(max_lines),
        }
    }

    /// Snapshot of the collected lines
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|lines| lines.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn append(&self, line: &str) -> Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|e| AuditError::Sink(format!("Sink lock poisoned: {}", e)))?;
        if self.max_lines.is_some_and(|max| lines.len() >= max) {
            return Err(AuditError::Sink(format!(
                "Memory sink full ({} lines)",
                lines.len()
            )));
        }
        lines.push(line.to_string());
        Ok(())
    }
}
