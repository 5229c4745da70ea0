//! Prometheus metrics for HTTP traffic.
//!
//! Labels are kept low-cardinality: the matched route template instead of
//! the raw path, and status codes bucketed to `2xx`..`5xx`.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Result, anyhow};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::AppConfig;

/// Route label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Fails if called twice.
pub fn init_metrics(config: &AppConfig) -> Result<()> {
    let handle = PrometheusBuilder::new()
        .add_global_label("service", config.telemetry.service_name.clone())
        .add_global_label("environment", config.telemetry.environment.clone())
        .add_global_label("version", env!("CARGO_PKG_VERSION"))
        .install_recorder()
        .map_err(|e| anyhow!("Failed to install Prometheus recorder: {}", e))?;

    PROMETHEUS
        .set(handle)
        .map_err(|_| anyhow!("Metrics recorder was already initialized"))?;

    tracing::info!(
        service = %config.telemetry.service_name,
        environment = %config.telemetry.environment,
        "Prometheus metrics recorder initialized"
    );
    Ok(())
}

pub fn bucket_status_code(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// Record one finished HTTP request. A no-op until [`init_metrics`] ran.
pub fn record_http_request(method: &str, route: &str, status_code: u16, duration: Duration) {
    let status_bucket = bucket_status_code(status_code);

    counter!(
        "http_request_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status_bucket
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status_bucket
    )
    .record(duration.as_secs_f64());

    tracing::debug!(
        method = %method,
        route = %route,
        status = %status_bucket,
        duration_ms = %duration.as_millis(),
        "HTTP request metrics recorded"
    );
}

/// `GET /metrics` in the Prometheus text format.
pub async fn metrics_handler() -> Response {
    match PROMETHEUS.get() {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}
