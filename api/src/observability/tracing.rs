//! OpenTelemetry tracer setup and W3C trace context propagation.

use anyhow::Result;
use axum::http::HeaderMap;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::{
    Resource,
    trace::{self, Sampler},
};
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};

use crate::config::TelemetryConfig;

/// Use W3C `traceparent`/`tracestate` for inbound context.
pub fn install_propagator() {
    global::set_text_map_propagator(TraceContextPropagator::new());
}

/// OTLP tracer exporting to the configured APM server.
///
/// The secret token, when set, is sent as a bearer authorization header.
pub fn create_otlp_tracer(config: &TelemetryConfig) -> Result<opentelemetry_sdk::trace::Tracer> {
    let mut exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&config.server_url)
        .with_timeout(std::time::Duration::from_secs(config.export_timeout_secs));

    if let Some(token) = config.secret_token.as_deref().filter(|t| !t.is_empty()) {
        let mut metadata = MetadataMap::new();
        let value: MetadataValue<Ascii> = format!("Bearer {}", token).parse()?;
        metadata.insert("authorization", value);
        exporter = exporter.with_metadata(metadata);
    }

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config()
                .with_sampler(Sampler::TraceIdRatioBased(config.sample_rate))
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", config.service_name.clone()),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    KeyValue::new("deployment.environment", config.environment.clone()),
                    KeyValue::new("telemetry.sdk.language", "rust"),
                ])),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    Ok(tracer)
}

/// Extract the caller's trace context from request headers.
pub fn extract_trace_context(headers: &HeaderMap) -> opentelemetry::Context {
    struct HeaderExtractor<'a>(&'a HeaderMap);

    impl Extractor for HeaderExtractor<'_> {
        fn get(&self, key: &str) -> Option<&str> {
            self.0.get(key).and_then(|v| v.to_str().ok())
        }

        fn keys(&self) -> Vec<&str> {
            self.0.keys().map(|k| k.as_str()).collect()
        }
    }

    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Flush pending spans.
pub fn shutdown_tracing() {
    global::shutdown_tracer_provider();
}
