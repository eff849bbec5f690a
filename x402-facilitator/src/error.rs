//! HTTP error mapping for the facilitator API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use x402::facilitator::FacilitatorError;

/// An API-level error with its HTTP status.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// A 400 for requests that cannot be interpreted at all.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<FacilitatorError> for ApiError {
    fn from(error: FacilitatorError) -> Self {
        let status = match &error {
            FacilitatorError::Malformed(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}
