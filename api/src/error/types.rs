use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Every error that escapes a handler is a 500. Missing fields are
    /// answered by the handlers themselves and never become an `AppError`.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        "Internal server error".to_string()
    }

    /// Full description for the server-side log, including the cause chain.
    pub fn detail(&self) -> String {
        match self {
            AppError::Internal(err) => format!("{:#}", err),
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

/// A fault that escaped a handler.
///
/// Attached to the response extensions so the instrumentation middleware can
/// log it against the request's trace and stamp the trace id on the body.
#[derive(Debug, Clone)]
pub struct FaultReport {
    pub status: StatusCode,
    pub message: String,
    pub detail: String,
    pub stack: Option<String>,
}

impl FaultReport {
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "handler panicked".to_string()
        };

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
            detail,
            stack: Some(std::backtrace::Backtrace::force_capture().to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let stack = match &self {
            AppError::Internal(err) => Some(err.backtrace().to_string()),
            _ => None,
        };
        let report = FaultReport {
            status,
            message: self.public_message(),
            detail: self.detail(),
            stack,
        };

        // Don't expose internal error details
        let body = Json(json!({
            "error": report.message,
            "observabilityMetadata": {
                "action": "ERROR_HANDLER",
                "result": "FAILURE",
                "error": report.message,
            }
        }));

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(report);
        response
    }
}
