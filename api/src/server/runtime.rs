use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Router,
    http::HeaderName,
    middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use super::AppState;
use crate::config::AppConfig;
use crate::context::{REQUEST_ID_HEADER, SPAN_ID_HEADER, TRACE_ID_HEADER};
use crate::handlers::{create_ticket, dashboard, login, search};
use crate::health::{liveness_handler, readiness_handler};
use crate::logging::StdoutSink;
use crate::middleware::instrument_requests;
use crate::observability::{metrics_handler, shutdown_tracing};

/// Response header a browser front end reads its debug trace id from.
pub const DEBUG_TRACE_ID_HEADER: &str = "x-debug-traceid";

/// Start the HTTP server and run until SIGINT/SIGTERM.
///
/// Binds the configured address, marks the service ready, logs the startup
/// banner, then serves until a shutdown signal. On shutdown, in-flight
/// background work gets `server.shutdown_timeout` seconds to finish.
pub async fn start_server(config: AppConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.bind, config.server.port);
    info!("Attempting to bind to {}", bind_addr);

    let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {}: {}. Is another process using this port?",
            bind_addr,
            e
        )
    })?;

    let state = AppState::from_config(config, Arc::new(StdoutSink));
    serve(listener, state, shutdown_signal()).await?;

    shutdown_tracing();
    info!("Server shutdown complete");
    Ok(())
}

/// Serve `state`'s router on an already bound listener until `shutdown`
/// resolves, then drain background tasks.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    let app = create_router(state.clone());

    state.readiness.mark_ready();
    log_banner(&state, local_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    let timeout = Duration::from_secs(state.config.server.shutdown_timeout);
    if !state.tasks.shutdown(timeout).await {
        error!(
            timeout_secs = state.config.server.shutdown_timeout,
            "Shutdown timed out with background work still running"
        );
    }
    Ok(())
}

/// Routes, instrumentation and CORS.
///
/// The instrumentation layer wraps every route including the fallback, so
/// even unmatched requests carry correlation headers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/login", post(login))
        .route("/dashboard", get(dashboard))
        .route("/tickets/create", post(create_ticket))
        .route("/search", get(search))
        .layer(middleware::from_fn_with_state(state.clone(), instrument_requests))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static(TRACE_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(SPAN_ID_HEADER),
            HeaderName::from_static(DEBUG_TRACE_ID_HEADER),
        ])
}

fn log_banner(state: &AppState, local_addr: std::net::SocketAddr) {
    let config = &state.config;
    info!(
        address = %local_addr,
        service = %config.telemetry.service_name,
        server_url = %config.telemetry.server_url,
        environment = %config.telemetry.environment,
        hostname = %state.resolver.hostname(),
        "{} listening on port {}",
        config.app.name,
        local_addr.port()
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
