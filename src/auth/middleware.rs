//! Axum extractors for authentication and rate limiting.

use super::coordinator::AuthCoordinator;
use crate::config::Config;
use crate::error::AppError;
use crate::storage::{ExpiringStore, StoreError};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use std::time::Duration;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthCoordinator,
    /// Backing store, used directly for rate-limit counters.
    pub store: Arc<dyn ExpiringStore>,
    pub config: Arc<Config>,
}

/// Authenticated session extractor.
///
/// Reads the session id from `Authorization: Bearer {id}`, falling back to
/// the `session_id` cookie. Returns 401 Unauthorized if missing or invalid.
pub struct AuthSession {
    pub session_id: String,
    pub user_id: String,
    pub wallet_address: String,
}

/// Pull the session id out of the request headers.
fn session_id_from_parts(parts: &Parts) -> Option<String> {
    if let Some(auth_header) = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
    {
        return auth_header
            .strip_prefix("Bearer ")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
    }

    parts
        .headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session_id = session_id_from_parts(parts)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        let session = state
            .auth
            .validate_session(&session_id)
            .await?
            .ok_or_else(|| {
                tracing::debug!("Invalid or expired session");
                AppError::Unauthorized("Invalid or expired session".to_string())
            })?;

        Ok(AuthSession {
            session_id,
            user_id: session.user_id,
            wallet_address: session.wallet_address,
        })
    }
}

/// Check a fixed-window rate limit.
///
/// # Arguments
/// * `store` - Counter store
/// * `key` - Rate limit key (e.g., "ratelimit:auth:127.0.0.1")
/// * `max` - Maximum requests allowed in window
/// * `window_secs` - Time window in seconds
/// * `deadline` - Bound on the store call; elapsing is `StoreError::Timeout`
///
/// # Returns
/// * `Ok(true)` if under limit
/// * `Ok(false)` if limit exceeded
pub async fn check_rate_limit(
    store: &dyn ExpiringStore,
    key: &str,
    max: u32,
    window_secs: u64,
    deadline: Duration,
) -> Result<bool, StoreError> {
    let count = tokio::time::timeout(
        deadline,
        store.incr_window(key, Duration::from_secs(window_secs)),
    )
    .await
    .map_err(|_| StoreError::Timeout)??;
    Ok(count <= u64::from(max))
}
