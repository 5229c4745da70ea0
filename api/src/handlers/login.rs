use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::{ObservabilityMetadata, json_body, present, simulate_work};
use crate::context::{random_base36, unix_millis};
use crate::error::AppError;
use crate::fields;
use crate::logging::{EventResult, Fields};
use crate::middleware::RequestTelemetry;
use crate::server::AppState;

const MISSING_CREDENTIALS: &str = "Missing credentials";

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
    pub username: String,
    pub trace_id: String,
    pub span_id: String,
    pub observability_metadata: ObservabilityMetadata<LoginDetails>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRejected {
    pub error: &'static str,
    pub trace_id: String,
    pub span_id: String,
    pub observability_metadata: ObservabilityMetadata<LoginDetails>,
}

/// `POST /login`: issues a mock token when both credentials are present.
pub async fn login(
    telemetry: RequestTelemetry,
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let credentials = json_body(body)?;
    let RequestTelemetry { context, logger, .. } = telemetry;

    let mut attempt = Fields::new();
    if let Some(username) = &credentials.username {
        attempt.insert("username".into(), username.as_str().into());
    }
    logger.business_event("User", "LOGIN", EventResult::Pending, attempt);

    simulate_work(state.simulation().login_delay_ms).await;

    let (Some(username), Some(_password)) =
        (present(&credentials.username), present(&credentials.password))
    else {
        logger.security_event(
            "User",
            "LOGIN_FAILED",
            EventResult::Failure,
            fields!({
                "reason": MISSING_CREDENTIALS,
                "username": present(&credentials.username).unwrap_or("unknown"),
            }),
        );
        context.label(&[("result", "FAILURE"), ("stage", "validation")]);

        let body = LoginRejected {
            error: "Missing username or password",
            trace_id: context.trace_id.clone(),
            span_id: context.span_id.clone(),
            observability_metadata: ObservabilityMetadata {
                action: "LOGIN",
                result: "FAILURE",
                details: LoginDetails {
                    username: None,
                    reason: Some(MISSING_CREDENTIALS),
                },
            },
        };
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    };

    let token = format!("token-{}-{}", unix_millis(), random_base36(9));

    logger.business_event(
        "User",
        "LOGIN",
        EventResult::Success,
        fields!({ "username": username, "tokenIssued": true }),
    );
    context.label(&[("result", "SUCCESS"), ("stage", "login"), ("username", username)]);

    let body = LoginResponse {
        ok: true,
        token,
        username: username.to_string(),
        trace_id: context.trace_id.clone(),
        span_id: context.span_id.clone(),
        observability_metadata: ObservabilityMetadata {
            action: "LOGIN",
            result: "SUCCESS",
            details: LoginDetails {
                username: Some(username.to_string()),
                reason: None,
            },
        },
    };
    Ok(Json(body).into_response())
}
