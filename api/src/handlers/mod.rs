//! Mock endpoints. Each one logs business events against the request's
//! context and answers with its correlation ids.

pub mod dashboard;
pub mod login;
pub mod search;
pub mod tickets;

pub use dashboard::dashboard;
pub use login::login;
pub use search::search;
pub use tickets::create_ticket;

use std::time::Duration;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use serde::Serialize;

use crate::error::AppError;

/// Stand-in for real work. Not cancellable.
pub(crate) async fn simulate_work(millis: u64) {
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

/// A request without a JSON content type counts as an empty body. Any other
/// rejection, including a field of the wrong JSON type, escapes as a fault.
pub(crate) fn json_body<T: Default>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}

/// `Some` only for non-empty strings.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// The `observabilityMetadata` envelope of a response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityMetadata<T: Serialize> {
    pub action: &'static str,
    pub result: &'static str,
    #[serde(flatten)]
    pub details: T,
}
