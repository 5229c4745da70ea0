use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use super::{EventKind, EventResult, EventSink, Fields, Level, LogEntry, RESERVED_FIELDS};
use crate::context::RequestContext;

/// Target of the `tracing` mirror of every business event.
pub const EVENT_TARGET: &str = "portal_api::events";

/// Static tags stamped on every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTags {
    pub logger_name: String,
    pub app: String,
    pub env: String,
    pub thread_name: String,
}

impl LogTags {
    pub fn new(
        logger_name: impl Into<String>,
        app: impl Into<String>,
        env: impl Into<String>,
    ) -> Self {
        Self {
            logger_name: logger_name.into(),
            app: app.into(),
            env: env.into(),
            thread_name: format!("pid-{}", std::process::id()),
        }
    }
}

/// Structured event logger bound to one request context.
///
/// Cheap to clone; clones share the context, tags and sink.
#[derive(Clone)]
pub struct EventLogger {
    context: Arc<RequestContext>,
    tags: Arc<LogTags>,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLogger")
            .field("trace_id", &self.context.trace_id)
            .field("tags", &self.tags)
            .finish()
    }
}

impl EventLogger {
    pub fn new(context: Arc<RequestContext>, tags: Arc<LogTags>, sink: Arc<dyn EventSink>) -> Self {
        Self { context, tags, sink }
    }

    pub fn context(&self) -> &Arc<RequestContext> {
        &self.context
    }

    /// Same tags and sink, different context.
    pub fn with_context(&self, context: Arc<RequestContext>) -> Self {
        Self {
            context,
            tags: self.tags.clone(),
            sink: self.sink.clone(),
        }
    }

    /// Build an entry, write it to the sink as one JSON line and return it.
    ///
    /// Field order: base fields, context fields, `extra`, then `app`/`env`.
    /// `extra` may override context fields and the event tags but never the
    /// reserved base fields.
    pub fn log(&self, level: Level, message: &str, extra: Fields) -> LogEntry {
        let mut fields = Fields::new();
        fields.insert(
            "@timestamp".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        fields.insert("@version".into(), Value::from("1"));
        fields.insert("message".into(), Value::from(message));
        fields.insert("level".into(), Value::from(level.as_str()));
        fields.insert("level_value".into(), Value::from(level.value()));
        fields.insert("logger_name".into(), Value::from(self.tags.logger_name.as_str()));
        fields.insert("thread_name".into(), Value::from(self.tags.thread_name.as_str()));
        fields.insert("HOSTNAME".into(), Value::from(self.context.hostname.as_str()));

        fields.extend(self.context.fields());

        for (key, value) in extra {
            if !RESERVED_FIELDS.contains(&key.as_str()) {
                fields.insert(key, value);
            }
        }

        fields.insert("app".into(), Value::from(self.tags.app.as_str()));
        fields.insert("env".into(), Value::from(self.tags.env.as_str()));

        let entry = LogEntry::new(fields);
        let line = entry.to_string();
        tracing::debug!(target: EVENT_TARGET, trace_id = %self.context.trace_id, "{}", line);
        self.sink.write_line(&line);
        entry
    }

    pub fn business_event(
        &self,
        entity: &str,
        action: &str,
        result: EventResult,
        extra: Fields,
    ) -> LogEntry {
        let message = format!("Business Event: {} {}", entity, action);
        let fields = tagged(EventKind::BusinessEvent, entity, action, result, extra);
        self.log(Level::Info, &message, fields)
    }

    pub fn external_call_failure(
        &self,
        entity: &str,
        action: &str,
        error: impl fmt::Display,
        extra: Fields,
    ) -> LogEntry {
        let message = format!("External Call Failed: {} {}", entity, action);
        let mut fields =
            tagged(EventKind::ExternalCall, entity, action, EventResult::Failure, extra);
        fields.insert("error".into(), Value::from(error.to_string()));
        self.log(Level::Error, &message, fields)
    }

    pub fn security_event(
        &self,
        entity: &str,
        action: &str,
        result: EventResult,
        extra: Fields,
    ) -> LogEntry {
        let message = format!("Security Event: {} {}", entity, action);
        let fields = tagged(EventKind::SecurityEvent, entity, action, result, extra);
        self.log(Level::Warn, &message, fields)
    }

    /// An `EXTERNAL_CALL` entry at INFO, used for request start and completion.
    pub fn external_call(
        &self,
        message: &str,
        entity: &str,
        action: &str,
        result: EventResult,
        extra: Fields,
    ) -> LogEntry {
        let fields = tagged(EventKind::ExternalCall, entity, action, result, extra);
        self.log(Level::Info, message, fields)
    }

    pub fn system_error(&self, error: &str, stack: Option<&str>) -> LogEntry {
        let message = format!("Unhandled error: {}", error);
        let mut fields = tagged(
            EventKind::SystemError,
            "System",
            "ERROR_HANDLER",
            EventResult::Failure,
            Fields::new(),
        );
        fields.insert("error".into(), Value::from(error));
        if let Some(stack) = stack {
            fields.insert("stack".into(), Value::from(stack));
        }
        self.log(Level::Error, &message, fields)
    }
}

/// Event tags followed by caller extras, so extras can retag the event.
fn tagged(
    kind: EventKind,
    entity: &str,
    action: &str,
    result: EventResult,
    extra: Fields,
) -> Fields {
    let mut fields = Fields::new();
    fields.insert("type".into(), Value::from(kind.as_str()));
    fields.insert("entity".into(), Value::from(entity));
    fields.insert("action".into(), Value::from(action));
    fields.insert("result".into(), Value::from(result.as_str()));
    fields.extend(extra);
    fields
}
