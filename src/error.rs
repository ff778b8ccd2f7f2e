//! User-visible errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::contact::mailer::MailError;
use crate::contact::submission::ValidationIssue;

/// The client has used up its contact submissions for the current window.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("Too Many Requests")]
pub struct RateLimitExceeded;

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response()
    }
}

/// Failures of the contact submission handler.
#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    /// Body was not a JSON object of strings.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("validation failed with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error("mail delivery failed: {0}")]
    Mail(#[from] MailError),
}

impl IntoResponse for ContactError {
    fn into_response(self) -> Response {
        match self {
            ContactError::InvalidBody(reason) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid request body.",
                    "issues": [ValidationIssue::new("body", reason)],
                })),
            )
                .into_response(),
            ContactError::Validation(issues) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Validation failed.",
                    "issues": issues,
                })),
            )
                .into_response(),
            ContactError::Mail(e) => {
                tracing::error!(error = %e, "Error sending contact email");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    }
}
