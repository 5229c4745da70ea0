use axum::{extract::State, http::StatusCode, response::Json};
use tracing::debug;

use super::{HealthResponse, HealthStatus};
use crate::server::AppState;

/// `GET /health`: the process is up.
pub async fn liveness_handler() -> Json<HealthResponse> {
    debug!("Liveness check requested");
    Json(HealthResponse::new(HealthStatus::Ok))
}

/// `GET /health/ready`: 503 until the listener is bound.
pub async fn readiness_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    debug!("Readiness check requested");

    let status = state.readiness.status();
    let code = match status {
        HealthStatus::Ready => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(HealthResponse::new(status)))
}
