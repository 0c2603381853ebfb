//! Error-to-HTTP response conversion.
//!
//! Wraps [`dr_core::Error`] so route handlers can return
//! `Result<T, AppError>` and use `?` on core results directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::middleware::request_id::current_request_id;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: dr_core::Error,
    request_id: Option<String>,
}

impl AppError {
    /// Wrap `inner`, picking up the request ID of the running handler.
    pub fn new(inner: dr_core::Error) -> Self {
        Self {
            inner,
            request_id: current_request_id(),
        }
    }

    pub fn inner(&self) -> &dr_core::Error {
        &self.inner
    }
}

impl From<dr_core::Error> for AppError {
    fn from(e: dr_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        } else {
            tracing::debug!(status = %status, error = %self.inner, "Request rejected");
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}
