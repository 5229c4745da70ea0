use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::http::Method;

use crate::fields;
use crate::logging::{EventLogger, EventResult};
use crate::observability::metrics::{UNMATCHED_ROUTE, record_http_request};

/// What the middleware knows about a finished request.
#[derive(Debug, Clone)]
pub struct ResponseOutcome {
    pub method: Method,
    pub path: String,
    /// Route template that matched, `None` when nothing did
    pub route: Option<String>,
    pub status: u16,
    pub elapsed: Duration,
}

impl ResponseOutcome {
    pub fn result(&self) -> EventResult {
        EventResult::from_status(self.status)
    }

    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Hook invoked once the handler has produced a response.
pub trait ResponseObserver: Send + Sync {
    fn on_response(&self, outcome: &ResponseOutcome);
}

/// Logs the `Request completed` entry of one request.
///
/// Only the first observation is logged; later ones are ignored.
#[derive(Debug)]
pub struct CompletionLogger {
    logger: EventLogger,
    fired: AtomicBool,
}

impl CompletionLogger {
    pub fn new(logger: EventLogger) -> Self {
        Self {
            logger,
            fired: AtomicBool::new(false),
        }
    }
}

impl ResponseObserver for CompletionLogger {
    fn on_response(&self, outcome: &ResponseOutcome) {
        if self.fired.swap(true, Ordering::SeqCst) {
            tracing::debug!(path = %outcome.path, "Completion already logged for this request");
            return;
        }

        self.logger.external_call(
            &format!("Request completed: {} {}", outcome.method, outcome.path),
            &outcome.path,
            outcome.method.as_str(),
            outcome.result(),
            fields!({
                "statusCode": outcome.status,
                "duration": outcome.duration_ms(),
            }),
        );
    }
}

/// Records request count and latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpMetricsObserver;

impl ResponseObserver for HttpMetricsObserver {
    fn on_response(&self, outcome: &ResponseOutcome) {
        let route = outcome.route.as_deref().unwrap_or(UNMATCHED_ROUTE);
        record_http_request(outcome.method.as_str(), route, outcome.status, outcome.elapsed);
    }
}
