//! Operational telemetry: `tracing` subscriber, OpenTelemetry export and
//! Prometheus metrics.

pub mod init;
pub mod metrics;
pub mod tracing;

pub use init::init_observability;
pub use metrics::{metrics_handler, record_http_request};
pub use tracing::{extract_trace_context, shutdown_tracing};
