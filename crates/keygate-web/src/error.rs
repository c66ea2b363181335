use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keygate_core::{CoreError, FieldError, ResetError};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    Core(CoreError),
    /// The body could not be read as the expected JSON payload.
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    kind: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message, details) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_failure", msg, None),
            AppError::Core(err) => {
                let kind = err.kind();
                match err {
                    CoreError::Validation(fields) => (
                        StatusCode::BAD_REQUEST,
                        kind,
                        "Validation error".to_string(),
                        Some(fields),
                    ),
                    CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, kind, msg, None),
                    CoreError::Unauthorized => {
                        (StatusCode::UNAUTHORIZED, kind, "Unauthorized".to_string(), None)
                    }
                    CoreError::Conflict(msg) => (StatusCode::CONFLICT, kind, msg, None),
                    CoreError::RateLimitExceeded => (
                        StatusCode::TOO_MANY_REQUESTS,
                        kind,
                        "Rate limit exceeded. Try again later.".to_string(),
                        None,
                    ),
                    CoreError::DependencyUnavailable(detail) => {
                        tracing::error!("Dependency unavailable: {detail}");
                        (
                            StatusCode::SERVICE_UNAVAILABLE,
                            kind,
                            "Service temporarily unavailable".to_string(),
                            None,
                        )
                    }
                    CoreError::Internal(detail) => {
                        // Log the real error server-side, return generic message to client
                        tracing::error!("Internal error: {detail}");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            kind,
                            "Internal server error".to_string(),
                            None,
                        )
                    }
                }
            }
        };

        let body = ErrorBody {
            success: false,
            kind,
            error: message,
            details,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError::Core(e)
    }
}

impl From<ResetError> for AppError {
    fn from(e: ResetError) -> Self {
        AppError::Core(e.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}
