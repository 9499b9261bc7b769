//! JSON error responses with stable machine-readable codes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::AppError;

pub mod codes {
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const RENDER: &str = "render_error";
    pub const MERGE: &str = "merge_error";
    pub const STORAGE: &str = "storage_error";
    pub const INTEGRITY: &str = "integrity_error";
    pub const INTERNAL: &str = "internal";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::INVALID_INPUT, message)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let message = err.to_string();
        match err {
            AppError::Validation(_) => {
                Self::new(StatusCode::BAD_REQUEST, codes::INVALID_INPUT, message)
            }
            AppError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
            }
            AppError::Conflict => Self::new(StatusCode::CONFLICT, codes::CONFLICT, message),
            AppError::Render(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, codes::RENDER, message)
            }
            AppError::Compose(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, codes::MERGE, message)
            }
            AppError::Storage(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, codes::STORAGE, message)
            }
            AppError::Integrity { .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, codes::INTEGRITY, message)
            }
            AppError::Persistence(_) | AppError::Task(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "internal error",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "request failed");
        }
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
