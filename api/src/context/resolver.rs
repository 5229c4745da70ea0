use axum::http::HeaderMap;
use chrono::Utc;
use rand::Rng;
use serde_json::Value;

use super::{Transaction, TransactionHandle};
use crate::logging::Fields;

/// HTTP header carrying the caller's trace id
pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const SPAN_ID_HEADER: &str = "x-span-id";
pub const BP_ID_HEADER: &str = "x-bp-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Tag embedded in span ids generated for this service's request spans
pub const SERVICE_SPAN_TAG: &str = "api";

/// Tag embedded in span ids of detached follow-up work
pub const BATCH_SPAN_TAG: &str = "batch";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Correlation identity of one inbound request.
///
/// Built once by [`ContextResolver::resolve`] and shared read-only for the
/// rest of the request. Follow-up work gets its own copy via [`child`].
///
/// [`child`]: RequestContext::child
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub request_id: String,
    pub span_id: String,
    pub bp_id: Option<String>,
    pub user_id: Option<String>,
    pub service: String,
    pub hostname: String,
    transaction: Option<TransactionHandle>,
}

impl RequestContext {
    pub fn transaction(&self) -> Option<&TransactionHandle> {
        self.transaction.as_ref()
    }

    /// Attach labels to the upstream transaction, if there is one.
    pub fn label(&self, labels: &[(&str, &str)]) {
        if let Some(transaction) = &self.transaction {
            transaction.add_labels(labels);
        }
    }

    /// Copy of this context for work that outlives the request.
    ///
    /// Keeps every correlation id except the span id. The child is detached
    /// from the request's transaction, which ends with the response.
    pub fn child(&self, span_id: String) -> Self {
        Self {
            span_id,
            transaction: None,
            ..self.clone()
        }
    }

    /// The context as log fields. Absent ids are omitted.
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("traceId".into(), Value::from(self.trace_id.as_str()));
        fields.insert("requestId".into(), Value::from(self.request_id.as_str()));
        fields.insert("spanId".into(), Value::from(self.span_id.as_str()));
        if let Some(bp_id) = &self.bp_id {
            fields.insert("bpId".into(), Value::from(bp_id.as_str()));
        }
        if let Some(user_id) = &self.user_id {
            fields.insert("userId".into(), Value::from(user_id.as_str()));
        }
        fields.insert("service".into(), Value::from(self.service.as_str()));
        fields.insert("hostname".into(), Value::from(self.hostname.as_str()));
        fields
    }
}

/// Derives a [`RequestContext`] from headers, the upstream transaction, and
/// generated fallbacks. Never fails.
#[derive(Debug, Clone)]
pub struct ContextResolver {
    service: String,
    hostname: String,
}

impl ContextResolver {
    pub fn new(service: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            hostname: hostname.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn resolve(
        &self,
        headers: &HeaderMap,
        transaction: Option<TransactionHandle>,
    ) -> RequestContext {
        let trace_id = transaction
            .as_ref()
            .map(|tx| tx.trace_id())
            .or_else(|| header_value(headers, TRACE_ID_HEADER))
            .unwrap_or_else(generate_trace_id);

        let request_id =
            header_value(headers, REQUEST_ID_HEADER).unwrap_or_else(generate_request_id);

        let span_id = transaction
            .as_ref()
            .map(|tx| tx.span_id())
            .unwrap_or_else(|| derive_span_id(&trace_id, SERVICE_SPAN_TAG));

        let bp_id = header_value(headers, BP_ID_HEADER);
        let user_id = header_value(headers, USER_ID_HEADER);

        if let Some(tx) = &transaction {
            label_transaction(
                tx.as_ref(),
                &request_id,
                bp_id.as_deref(),
                user_id.as_deref(),
                &self.service,
            );
        }

        RequestContext {
            trace_id,
            request_id,
            span_id,
            bp_id,
            user_id,
            service: self.service.clone(),
            hostname: self.hostname.clone(),
            transaction,
        }
    }
}

fn label_transaction(
    transaction: &dyn Transaction,
    request_id: &str,
    bp_id: Option<&str>,
    user_id: Option<&str>,
    service: &str,
) {
    transaction.add_labels(&[
        ("requestId", request_id),
        ("bpId", bp_id.unwrap_or("")),
        ("userId", user_id.unwrap_or("")),
        ("service", service),
    ]);
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Host name of this process, looked up once at startup.
pub fn resolve_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

pub(crate) fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// `trace-<unix millis>-<9 random base36 chars>`
pub fn generate_trace_id() -> String {
    format!("trace-{}-{}", unix_millis(), random_base36(9))
}

/// `req-<unix millis>`
pub fn generate_request_id() -> String {
    format!("req-{}", unix_millis())
}

/// `<trace id>-<tag>-<unix millis>`
pub fn derive_span_id(trace_id: &str, tag: &str) -> String {
    format!("{}-{}-{}", trace_id, tag, unix_millis())
}

pub(crate) fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
