use axum::{Json, extract::State};
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;

use super::{ObservabilityMetadata, simulate_work};
use crate::fields;
use crate::logging::{EventResult, Fields};
use crate::middleware::RequestTelemetry;
use crate::server::AppState;

const DATA_POINTS: u32 = 10;
const TOTAL_TICKETS: u32 = 42;
const OPEN_TICKETS: u32 = 7;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub welcome: &'static str,
    pub timestamp: String,
    pub metrics: DashboardMetrics,
    pub trace_id: String,
    pub span_id: String,
    pub observability_metadata: ObservabilityMetadata<DashboardDetails>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_tickets: u32,
    pub open_tickets: u32,
    pub avg_response_time: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDetails {
    pub data_points: u32,
    pub total_tickets: u32,
    pub open_tickets: u32,
}

/// `GET /dashboard`: static mock metrics after a jittered delay.
pub async fn dashboard(
    telemetry: RequestTelemetry,
    State(state): State<AppState>,
) -> Json<DashboardResponse> {
    let RequestTelemetry { context, logger, .. } = telemetry;

    let mut access = Fields::new();
    if let Some(user_id) = &context.user_id {
        access.insert("userId".into(), user_id.as_str().into());
    }
    logger.business_event("Dashboard", "ACCESS", EventResult::Pending, access);

    let simulation = state.simulation();
    let jitter = rand::thread_rng().gen_range(0..=simulation.dashboard_jitter_ms);
    simulate_work(simulation.dashboard_delay_ms + jitter).await;

    logger.business_event(
        "Dashboard",
        "LOAD",
        EventResult::Success,
        fields!({ "dataPoints": DATA_POINTS }),
    );
    context.label(&[("result", "SUCCESS"), ("stage", "dashboard")]);

    Json(DashboardResponse {
        welcome: "Welcome to your dashboard!",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        metrics: DashboardMetrics {
            total_tickets: TOTAL_TICKETS,
            open_tickets: OPEN_TICKETS,
            avg_response_time: "2.5 hours",
        },
        trace_id: context.trace_id.clone(),
        span_id: context.span_id.clone(),
        observability_metadata: ObservabilityMetadata {
            action: "LOAD_DASHBOARD",
            result: "SUCCESS",
            details: DashboardDetails {
                data_points: DATA_POINTS,
                total_tickets: TOTAL_TICKETS,
                open_tickets: OPEN_TICKETS,
            },
        },
    })
}
