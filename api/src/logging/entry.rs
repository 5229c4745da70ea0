use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Flat field map of a log entry.
pub type Fields = Map<String, Value>;

/// Fields that callers can never override.
pub const RESERVED_FIELDS: [&str; 5] =
    ["@timestamp", "@version", "message", "level", "level_value"];

/// Turn a `json!` object into [`Fields`]. Anything but an object yields no fields.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Build [`Fields`] from a JSON object literal.
///
/// ```ignore
/// let extra = fields!({ "username": username, "tokenIssued": true });
/// ```
#[macro_export]
macro_rules! fields {
    ($($json:tt)+) => {
        $crate::logging::fields(::serde_json::json!($($json)+))
    };
}

/// Severity of an entry. `level_value` grows with severity so log consumers
/// can filter numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    pub fn value(&self) -> u32 {
        match self {
            Level::Info => 20000,
            Level::Warn => 30000,
            Level::Error => 40000,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `type` tag of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    BusinessEvent,
    ExternalCall,
    SecurityEvent,
    SystemError,
    BatchProcess,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BusinessEvent => "BUSINESS_EVENT",
            EventKind::ExternalCall => "EXTERNAL_CALL",
            EventKind::SecurityEvent => "SECURITY_EVENT",
            EventKind::SystemError => "SYSTEM_ERROR",
            EventKind::BatchProcess => "BATCH_PROCESS",
        }
    }
}

/// The `result` tag of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventResult {
    Pending,
    Success,
    Failure,
}

impl EventResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventResult::Pending => "PENDING",
            EventResult::Success => "SUCCESS",
            EventResult::Failure => "FAILURE",
        }
    }

    /// SUCCESS below 400, FAILURE otherwise.
    pub fn from_status(status: u16) -> Self {
        if status < 400 {
            EventResult::Success
        } else {
            EventResult::Failure
        }
    }
}

/// One emitted log line. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogEntry(Fields);

impl LogEntry {
    pub(crate) fn new(fields: Fields) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn into_fields(self) -> Fields {
        self.0
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&line)
    }
}
