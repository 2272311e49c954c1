use crate::models::ValidationIssue;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("quiz not found")]
    NotFound,
    #[error("quiz belongs to another user")]
    Forbidden,
    #[error("quiz validation failed")]
    Validation(Vec<ValidationIssue>),
    #[error("storage failure: {0}")]
    Io(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub field: String,
    pub issue: String,
}

impl From<ValidationIssue> for ErrorDetail {
    fn from(i: ValidationIssue) -> Self {
        Self {
            field: i.field,
            issue: i.issue,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Vec::new(),
            request_id: request_id.into(),
        }
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }

    pub fn unauthorized(request_id: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "please sign in", request_id)
    }

    pub fn not_found(what: &str, request_id: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found"), request_id)
    }

    pub fn from_store(err: StoreError, request_id: impl Into<String>) -> Self {
        match err {
            // not owned looks the same as missing to the caller
            StoreError::NotFound | StoreError::Forbidden => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "quiz not found or you don't have permission to change it",
                request_id,
            ),
            StoreError::Validation(issues) => Self::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "quiz validation failed",
                request_id,
            )
            .with_details(issues.into_iter().map(ErrorDetail::from).collect()),
            StoreError::Io(message) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                message,
                request_id,
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let payload = ErrorBody {
            error: ErrorPayload {
                code: self.code,
                message: self.message,
                details: self.details,
                request_id: self.request_id,
            },
        };
        (self.status, Json(payload)).into_response()
    }
}
