use std::io::Write;
use std::sync::{Arc, Mutex};

use super::{Fields, LogEntry};

/// Destination of the business event stream.
///
/// Implementations must write each line atomically: lines from concurrent
/// requests may interleave but never tear.
pub trait EventSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes one JSON line per entry to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn write_line(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line) {
            tracing::warn!(error = %e, "Failed to write event line to stdout");
        }
    }
}

/// Keeps every line in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    /// Lines parsed back into entries. Lines that are not JSON objects are skipped.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str::<Fields>(line).ok())
            .map(LogEntry::new)
            .collect()
    }

    /// Entries whose `message` equals `message`.
    pub fn entries_with_message(&self, message: &str) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.get_str("message") == Some(message))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn write_line(&self, line: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
    }
}
