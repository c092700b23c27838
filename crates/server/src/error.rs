//! Unified error handling for the server.
//!
//! Every failure renders the JSON envelope `{ success: false, message, error }`.
//! Validation problems are client errors; persistence problems are server
//! errors; a currency-gateway failure is a bad-gateway error that aborts the
//! whole aggregate computation.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::rates::RateError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Currency-rate gateway call failed.
    #[error("Failed to fetch currency rates: {0}")]
    Rates(#[from] RateError),

    /// Missing or invalid required request fields.
    #[error("{0}")]
    Validation(String),
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Report server-side failures to Sentry
        if matches!(self, Self::Database(_) | Self::Rates(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let (status, message, detail) = match &self {
            Self::Database(RepositoryError::Conflict(what)) => (
                StatusCode::CONFLICT,
                what.clone(),
                None,
            ),
            Self::Database(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                Some(e.to_string()),
            ),
            Self::Rates(e) => (
                StatusCode::BAD_GATEWAY,
                "Failed to fetch currency rates".to_string(),
                Some(e.to_string()),
            ),
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message.clone(), None),
        };

        let body = ErrorBody {
            success: false,
            message,
            error: detail,
        };
        (status, Json(body)).into_response()
    }
}

/// Extract a required request field or fail with the given client message.
pub fn require<T>(value: Option<T>, message: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(message.to_string()))
}
