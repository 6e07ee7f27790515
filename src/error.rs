//! # Centralized Error Handling
//!
//! This module provides a unified error handling system for the application.
//! It centralizes error logging and HTTP response generation, so services can
//! return domain failures with `?` and handlers never build error bodies by hand.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::InvalidTransition;
use crate::services::jwt::JwtError;
use crate::services::payment::PaymentError;
use crate::services::storage::StorageError;

/// Central application error type that encompasses all possible error conditions.
///
/// _Db and upstream errors are logged automatically, while other errors should be
/// logged at the point of creation if needed._
#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error")]
    Db(#[from] sqlx::Error),

    #[error("UUID parsing error")]
    Uuid(#[from] uuid::Error),

    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("bad request: {0}")]
    BadRequest(&'static str),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("internal server error")]
    Internal,

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("too many requests")]
    TooManyRequests,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(&'static str),

    #[error("upstream failure: {message}")]
    Upstream {
        message: &'static str,
        detail: String,
    },
}

impl AppError {
    /// Builds an [`AppError::Upstream`] carrying the collaborator's own error text for logs.
    pub fn upstream(message: &'static str, detail: impl ToString) -> Self {
        AppError::Upstream {
            message,
            detail: detail.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::BadRequest(err.0)
    }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::DatabaseError(e) => AppError::Db(e),
            JwtError::EncodingError(_) => AppError::Internal,
            JwtError::InvalidToken | JwtError::TokenExpired | JwtError::RefreshTokenNotFound => {
                AppError::Unauthorized("invalid refresh token")
            }
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        AppError::upstream("payment processor request failed", err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(_) => AppError::BadRequest("invalid file key"),
            StorageError::InvalidSignature => {
                AppError::Forbidden("upload URL is invalid or has expired")
            }
            other => AppError::upstream("file storage request failed", other),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Db(e) => error!(?e, "Database error occurred"),
            AppError::Upstream { message, detail } => {
                error!(%message, %detail, "Upstream service error occurred")
            }
            AppError::Validation(msg) => warn!(%msg, "Request validation failed"),
            _ => {}
        }

        let (status, message) = match self {
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error".into()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.into()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.into()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.into()),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".into(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.into()),
            AppError::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded".into())
            }
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.into()),
            AppError::Upstream { message, .. } => (StatusCode::BAD_GATEWAY, message.into()),
            AppError::Uuid(_) => (StatusCode::BAD_REQUEST, "Invalid UUID format".into()),
        };

        let body = Json(ErrorBody { message });
        (status, body).into_response()
    }
}

/// Convenience Result type alias that uses AppError as the error type.
pub type AppResult<T> = Result<T, AppError>;
