//! Operational logging, tracing and metrics setup at server startup.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use super::metrics::init_metrics;
use super::tracing::{create_otlp_tracer, install_propagator};
use crate::config::AppConfig;

/// Install the global subscriber, the OTLP tracer and the metrics recorder.
///
/// Operational logs go to stderr so stdout carries only the event stream.
pub fn init_observability(config: &AppConfig) -> Result<()> {
    install_propagator();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let fmt_layer = if config.logging.format == "json" {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .boxed()
    };

    let telemetry_layer = if config.telemetry.enabled {
        let tracer = create_otlp_tracer(&config.telemetry)?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(telemetry_layer)
        .try_init()?;

    init_metrics(config)?;

    tracing::info!(
        environment = %config.telemetry.environment,
        log_format = %config.logging.format,
        tracing_enabled = %config.telemetry.enabled,
        server_url = %config.telemetry.server_url,
        sample_rate = %config.telemetry.sample_rate,
        "Observability components initialized"
    );
    Ok(())
}
