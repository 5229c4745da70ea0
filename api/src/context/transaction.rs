//! Handle to the upstream APM transaction of a request.
//!
//! The transaction is passed explicitly through [`RequestContext`]; nothing
//! reads an ambient "current transaction".
//!
//! [`RequestContext`]: super::RequestContext

use std::fmt;
use std::sync::Arc;

use opentelemetry::KeyValue;
use opentelemetry::trace::{SpanContext, TraceContextExt};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// The upstream telemetry transaction a request belongs to.
pub trait Transaction: Send + Sync + fmt::Debug {
    /// Trace id assigned by the tracer
    fn trace_id(&self) -> String;

    /// Id of this service's span within the trace
    fn span_id(&self) -> String;

    /// Attach correlation labels to the transaction
    fn add_labels(&self, labels: &[(&str, &str)]);
}

pub type TransactionHandle = Arc<dyn Transaction>;

/// Transaction backed by the OpenTelemetry context of a `tracing` span.
#[derive(Debug, Clone)]
pub struct OtelTransaction {
    span: Span,
    span_context: SpanContext,
}

impl OtelTransaction {
    /// Returns `None` when no OpenTelemetry layer is recording the span.
    pub fn from_span(span: &Span) -> Option<Self> {
        let context = span.context();
        let span_context = context.span().span_context().clone();

        if span_context.is_valid() {
            Some(Self {
                span: span.clone(),
                span_context,
            })
        } else {
            None
        }
    }

    pub fn into_handle(self) -> TransactionHandle {
        Arc::new(self)
    }
}

impl Transaction for OtelTransaction {
    fn trace_id(&self) -> String {
        format!("{:032x}", self.span_context.trace_id())
    }

    fn span_id(&self) -> String {
        format!("{:016x}", self.span_context.span_id())
    }

    fn add_labels(&self, labels: &[(&str, &str)]) {
        let context = self.span.context();
        let span = context.span();
        for (key, value) in labels {
            span.set_attribute(KeyValue::new(format!("labels.{}", key), value.to_string()));
        }
    }
}

/// In-memory transaction for tests: fixed ids, records every label.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordedTransaction {
    pub trace_id: String,
    pub span_id: String,
    pub labels: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl RecordedTransaction {
    pub fn new(trace_id: &str, span_id: &str) -> Arc<Self> {
        Arc::new(Self {
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            labels: Default::default(),
        })
    }

    pub fn label(&self, key: &str) -> Option<String> {
        self.labels
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
impl Transaction for RecordedTransaction {
    fn trace_id(&self) -> String {
        self.trace_id.clone()
    }

    fn span_id(&self) -> String {
        self.span_id.clone()
    }

    fn add_labels(&self, labels: &[(&str, &str)]) {
        let mut recorded = self.labels.lock().unwrap();
        recorded.extend(labels.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    }
}
