//! Error types and Axum response conversions.

use crate::auth::AuthError;
use crate::storage::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Client-facing message for every rejected credential.
pub const AUTH_FAILED: &str = "Authentication failed";

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited")]
    RateLimited,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Collapse the auth taxonomy at the transport boundary.
///
/// Credential failures all become the same 401 so a caller cannot tell a
/// wrong signature from an unknown nonce. Store and directory failures
/// become 500.
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if err.is_infrastructure() {
            AppError::Internal(err.to_string())
        } else {
            tracing::warn!(action = "auth_failed", kind = err.kind(), error = %err, "Authentication failed");
            AppError::Unauthorized(AUTH_FAILED.to_string())
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}
