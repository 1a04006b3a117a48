//! API error responses
//!
//! Maps core errors onto the HTTP error taxonomy: validation 400,
//! conflict 409, not-found 404, analyzer failure 502 with the upstream
//! detail passed through, everything else 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use bpfcat_core::Error;

/// An error response: status code plus a JSON body of
/// `{"error": ..., "details"?: ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            Error::DuplicateUrl(_) => Self::new(
                StatusCode::CONFLICT,
                "Repository with this URL already exists",
            ),
            Error::RepoNotFound(_) => Self::new(StatusCode::NOT_FOUND, "Repository not found"),
            Error::SnapshotNotFound { kind, .. } => {
                Self::new(StatusCode::NOT_FOUND, format!("{} not found", capitalize(kind)))
            }
            Error::Analyzer(details) => Self {
                status: StatusCode::BAD_GATEWAY,
                message: "Analyzer service unavailable".to_string(),
                details: Some(details),
            },
            other => {
                tracing::error!(error = %other, "internal error");
                Self::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            details: self.details.as_deref(),
        };
        (self.status, Json(&body)).into_response()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
