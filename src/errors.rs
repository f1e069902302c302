#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Kinds map onto HTTP statuses at the transport boundary; business code
/// recovers locally only for `AiUnavailable`, `RateLimit`, and
/// `SourceUnavailable` — everything else bubbles up.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("AI service unavailable: {0}")]
    AiUnavailable(String),

    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Cancelled")]
    Cancelled,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::AlreadyExists(msg) => (StatusCode::CONFLICT, "ALREADY_EXISTS", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::RateLimit(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", msg.clone())
            }
            AppError::SourceUnavailable(msg) => {
                (StatusCode::BAD_GATEWAY, "SOURCE_UNAVAILABLE", msg.clone())
            }
            AppError::AiUnavailable(msg) => {
                tracing::warn!("AI unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "AI_UNAVAILABLE",
                    "The AI service is currently unavailable".to_string(),
                )
            }
            AppError::StorageIo(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
            AppError::Cancelled => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CANCELLED",
                "The operation was cancelled".to_string(),
            ),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
