//! Error handling - RFC 7807 compliant responses.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use crosspost_shared::ErrorResponse;
use std::fmt;

use crosspost_core::SchedulingError;
use crosspost_core::error::RepoError;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unprocessable(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Unprocessable(msg) => write!(f, "Validation failed: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            AppError::NotFound(detail) => ErrorResponse::not_found(detail),
            AppError::BadRequest(detail) => ErrorResponse::bad_request(detail),
            AppError::Conflict(detail) => ErrorResponse::conflict(detail),
            AppError::Unprocessable(detail) => ErrorResponse::unprocessable(detail),
            AppError::Internal(detail) => {
                // Log internal errors; clients get an opaque 500.
                tracing::error!("Internal error: {}", detail);
                ErrorResponse::internal_error()
            }
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

// Conversion from domain errors.
impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::PostNotFound(id) => {
                AppError::NotFound(format!("Post {} not found", id))
            }
            SchedulingError::NoActiveSchedule => {
                AppError::NotFound("Post has no active schedule".to_string())
            }
            SchedulingError::InvalidSchedule => AppError::Unprocessable(err.to_string()),
            SchedulingError::EmptyPlatforms | SchedulingError::EmptyContent => {
                AppError::BadRequest(err.to_string())
            }
            SchedulingError::AlreadyPublishing
            | SchedulingError::NotEditable(_)
            | SchedulingError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            SchedulingError::Queue(e) => AppError::Internal(format!("Queue failure: {}", e)),
            SchedulingError::Repo(e) => e.into(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound("Resource not found".to_string()),
            RepoError::Conflict(msg) | RepoError::Constraint(msg) => AppError::Conflict(msg),
            RepoError::Connection(msg) | RepoError::Query(msg) => {
                AppError::Internal(format!("Database error: {}", msg))
            }
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
