//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; any [`em_core::Error`]
//! converts with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError {
    inner: em_core::Error,
}

impl AppError {
    pub fn new(inner: em_core::Error) -> Self {
        Self { inner }
    }

    fn code(&self) -> &'static str {
        match &self.inner {
            em_core::Error::NotFound { .. } => "not_found",
            em_core::Error::Validation(_) => "validation_error",
            em_core::Error::Conflict(_) => "conflict",
            em_core::Error::Database { .. } => "database_error",
            em_core::Error::Io { .. } => "io_error",
            em_core::Error::Tool { .. } => "tool_error",
            em_core::Error::ExecutionFailed { .. } => "execution_failed",
            em_core::Error::MissingInput { .. } => "missing_input",
            em_core::Error::Cancelled => "cancelled",
            em_core::Error::Internal(_) => "internal_error",
        }
    }
}

impl From<em_core::Error> for AppError {
    fn from(e: em_core::Error) -> Self {
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
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::new(em_core::Error::not_found("video", "abc"));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_produces_409() {
        let err = AppError::new(em_core::Error::Conflict("busy".into()));
        assert_eq!(err.code(), "conflict");
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_produces_400() {
        let err = AppError::new(em_core::Error::Validation("bad".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn database_produces_500() {
        let err = AppError::new(em_core::Error::database("locked"));
        assert_eq!(err.code(), "database_error");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
