//! Client-facing error responses.
//!
//! Every failure surfaces as a JSON body of the form
//! `{"error": {"id": "...", "message": "..."}}` with a stable id per
//! failure class. Messages are generic for server-side failures; the
//! underlying detail only reaches the log stream.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::errors::Error;

/// A response-ready error with a stable id.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub id: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, id: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            id,
            message: message.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "Invalid authentication credentials provided",
        )
    }

    pub fn unauthorized_ip() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "unauthorized-ip",
            "You are not authorized to access the server from your current IP",
        )
    }

    pub fn unauthorized_path() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "unauthorized-path",
            "You are not authorized to access this path on the server",
        )
    }

    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "auth-rate-limited",
            "Your IP is rate-limited because of too many failed authentication attempts",
        )
    }

    pub fn not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "not-found",
            "The resource you are looking for does not exist",
        )
    }

    pub fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "method-not-allowed",
            "The method is not allowed for the requested URL",
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad-request", message)
    }

    pub fn request_body_invalid(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "request-body-invalid",
            message,
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal-server-error",
            "An internal server error occured",
        )
    }
}

/// Server-side pipeline failures are 500s with the error's stable id and
/// its generic message. The full chain is logged where the error is caught.
impl From<&Error> for ApiError {
    fn from(error: &Error) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error.id(),
            error.public_message(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "id": self.id,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}
