use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderName, HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use serde_json::json;
use tracing::{Instrument, Span, field, info_span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{CompletionLogger, ResponseObserver, ResponseOutcome};
use crate::context::{
    OtelTransaction, REQUEST_ID_HEADER, RequestContext, SPAN_ID_HEADER, TRACE_ID_HEADER,
};
use crate::error::{AppError, FaultReport};
use crate::logging::{EventLogger, EventResult, Fields};
use crate::observability::extract_trace_context;
use crate::server::AppState;
use crate::tasks::CancelToken;

/// Per-request telemetry placed in the request extensions.
///
/// Handlers take it as an extractor.
#[derive(Debug, Clone)]
pub struct RequestTelemetry {
    pub context: Arc<RequestContext>,
    pub logger: EventLogger,
    /// Child of the server shutdown token; handed on to follow-up work
    pub cancel: CancelToken,
}

impl<S> FromRequestParts<S> for RequestTelemetry
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestTelemetry>()
            .cloned()
            .ok_or_else(|| {
                AppError::Server(
                    "request telemetry missing, instrumentation layer not installed".to_string(),
                )
            })
    }
}

/// Correlates every request with a trace and logs its lifecycle.
///
/// Resolves the request context, logs the incoming request, runs the rest of
/// the stack, turns escaped faults into `SYSTEM_ERROR` entries, stamps the
/// correlation headers and hands the outcome to the response observers.
pub async fn instrument_requests(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(
        "http_request",
        method = %method,
        path = %path,
        trace_id = field::Empty,
        status = field::Empty,
    );
    span.set_parent(extract_trace_context(request.headers()));
    let transaction = OtelTransaction::from_span(&span).map(OtelTransaction::into_handle);

    let context = Arc::new(state.resolver.resolve(request.headers(), transaction));
    span.record("trace_id", context.trace_id.as_str());

    let logger = EventLogger::new(context.clone(), state.tags.clone(), state.sink.clone());
    let cancel = state.tasks.shutdown_token().child();

    let mut extra = Fields::new();
    if let Some(user_agent) = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
    {
        extra.insert("userAgent".into(), user_agent.into());
    }
    logger.external_call(
        &format!("Incoming request: {} {}", method, path),
        &path,
        method.as_str(),
        EventResult::Pending,
        extra,
    );

    request.extensions_mut().insert(RequestTelemetry {
        context: context.clone(),
        logger: logger.clone(),
        cancel,
    });

    let mut response = match AssertUnwindSafe(next.run(request))
        .catch_unwind()
        .instrument(span.clone())
        .await
    {
        Ok(response) => response,
        Err(payload) => {
            let report = FaultReport::from_panic(payload.as_ref());
            let mut response = report.status.into_response();
            response.extensions_mut().insert(report);
            response
        }
    };

    if let Some(report) = response.extensions_mut().remove::<FaultReport>() {
        logger.system_error(&report.detail, report.stack.as_deref());
        response = fault_response(&report, &context);
    }

    set_correlation_headers(&mut response, &context);

    let status = response.status().as_u16();
    span.record("status", status);
    let outcome = ResponseOutcome {
        method,
        route: (status != 404).then(|| path.clone()),
        path,
        status,
        elapsed: started.elapsed(),
    };

    CompletionLogger::new(logger).on_response(&outcome);
    for observer in state.observers.iter() {
        observer.on_response(&outcome);
    }

    log_finished(&span, &outcome);
    response
}

fn fault_response(report: &FaultReport, context: &RequestContext) -> Response {
    let body = Json(json!({
        "error": report.message,
        "traceId": context.trace_id,
        "observabilityMetadata": {
            "action": "ERROR_HANDLER",
            "result": "FAILURE",
            "error": report.message,
        }
    }));
    (report.status, body).into_response()
}

fn set_correlation_headers(response: &mut Response, context: &RequestContext) {
    let headers = response.headers_mut();
    for (name, value) in [
        (TRACE_ID_HEADER, &context.trace_id),
        (REQUEST_ID_HEADER, &context.request_id),
        (SPAN_ID_HEADER, &context.span_id),
    ] {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(name), value);
            }
            Err(_) => tracing::warn!(header = name, "Correlation id is not a valid header value"),
        }
    }
}

fn log_finished(span: &Span, outcome: &ResponseOutcome) {
    tracing::info!(
        parent: span,
        status = outcome.status,
        duration_ms = outcome.duration_ms(),
        "Request finished"
    );
}
