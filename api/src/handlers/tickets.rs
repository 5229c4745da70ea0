use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{ObservabilityMetadata, json_body, present, simulate_work};
use crate::context::{BATCH_SPAN_TAG, derive_span_id, unix_millis};
use crate::error::AppError;
use crate::fields;
use crate::logging::{EventKind, EventLogger, EventResult, Fields};
use crate::middleware::RequestTelemetry;
use crate::server::AppState;

const MISSING_FIELDS: &str = "Missing required fields";

#[derive(Debug, Default, Deserialize)]
pub struct CreateTicketRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketCreated {
    pub ticket_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub title: String,
    pub trace_id: String,
    pub span_id: String,
    pub observability_metadata: ObservabilityMetadata<TicketDetails>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRejected {
    pub error: &'static str,
    pub trace_id: String,
    pub observability_metadata: ObservabilityMetadata<TicketDetails>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// `POST /tickets/create`: creates a mock ticket and schedules officer
/// assignment as detached follow-up work.
pub async fn create_ticket(
    telemetry: RequestTelemetry,
    State(state): State<AppState>,
    body: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let ticket = json_body(body)?;
    let RequestTelemetry { context, logger, cancel } = telemetry;

    let mut attempt = Fields::new();
    if let Some(priority) = &ticket.priority {
        attempt.insert("priority".into(), priority.as_str().into());
    }
    if let Some(user_id) = &context.user_id {
        attempt.insert("userId".into(), user_id.as_str().into());
    }
    logger.business_event("Ticket", "CREATE", EventResult::Pending, attempt);

    simulate_work(state.simulation().ticket_delay_ms).await;

    let (Some(title), Some(_description)) =
        (present(&ticket.title), present(&ticket.description))
    else {
        logger.business_event(
            "Ticket",
            "CREATE",
            EventResult::Failure,
            fields!({ "reason": MISSING_FIELDS }),
        );

        let body = TicketRejected {
            error: "Title and description are required",
            trace_id: context.trace_id.clone(),
            observability_metadata: ObservabilityMetadata {
                action: "CREATE_TICKET",
                result: "FAILURE",
                details: TicketDetails {
                    reason: Some(MISSING_FIELDS),
                    ..Default::default()
                },
            },
        };
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    };

    let ticket_id = generate_ticket_id();

    let mut created = fields!({ "ticketId": ticket_id, "title": title });
    if let Some(priority) = &ticket.priority {
        created.insert("priority".into(), priority.as_str().into());
    }
    logger.business_event("Ticket", "CREATE", EventResult::Success, created);

    let assignment_delay = state.simulation().assignment_delay_ms;
    state.tasks.spawn(
        "ticket_assignment",
        cancel,
        assign_officer(logger, ticket_id.clone(), assignment_delay),
    );

    context.label(&[
        ("result", "SUCCESS"),
        ("ticketId", &ticket_id),
        ("priority", ticket.priority.as_deref().unwrap_or("")),
    ]);

    let body = TicketCreated {
        ticket_id: ticket_id.clone(),
        status: "created",
        priority: ticket.priority.clone(),
        title: title.to_string(),
        trace_id: context.trace_id.clone(),
        span_id: context.span_id.clone(),
        observability_metadata: ObservabilityMetadata {
            action: "CREATE_TICKET",
            result: "SUCCESS",
            details: TicketDetails {
                ticket_id: Some(ticket_id),
                priority: ticket.priority,
                reason: None,
            },
        },
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `TKT-` followed by the last six digits of the current unix millis.
pub fn generate_ticket_id() -> String {
    let millis = unix_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(6)..];
    format!("TKT-{}", tail)
}

/// Follow-up run after the response: logs the automatic officer assignment
/// under a child span of the originating request.
async fn assign_officer(logger: EventLogger, ticket_id: String, delay_ms: u64) {
    simulate_work(delay_ms).await;

    let assigned_officer = format!("OFF-{}", rand::thread_rng().gen_range(0..100));
    let context = logger
        .context()
        .child(derive_span_id(&logger.context().trace_id, BATCH_SPAN_TAG));
    let batch_logger = logger.with_context(Arc::new(context));

    batch_logger.business_event(
        "Ticket",
        "ASSIGN_OFFICER",
        EventResult::Success,
        fields!({
            "ticketId": ticket_id,
            "assignedOfficer": assigned_officer,
            "type": EventKind::BatchProcess.as_str(),
            "processType": "AUTO_ASSIGNMENT",
        }),
    );
}
