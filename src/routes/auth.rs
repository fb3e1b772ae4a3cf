//! Auth API endpoints.

use crate::auth::middleware::{check_rate_limit, AppState, AuthSession, SESSION_COOKIE};
use crate::error::AppError;
use crate::models::{MeResponse, NonceResponse, SiweRequest, SiweResponse, UserInfo};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

/// Fixed window for the per-IP auth limit.
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Enforce the per-IP limit shared by the nonce and sign-in endpoints.
async fn enforce_rate_limit(
    state: &AppState,
    addr: &SocketAddr,
    endpoint: &'static str,
) -> Result<(), AppError> {
    let rate_limit_key = format!("ratelimit:auth:{}", addr.ip());
    let allowed = check_rate_limit(
        state.store.as_ref(),
        &rate_limit_key,
        state.config.rate_limit_auth_per_min,
        RATE_LIMIT_WINDOW_SECS,
        state.auth.settings().store_timeout,
    )
    .await
    .map_err(|e| AppError::Internal(format!("Rate limit check failed: {}", e)))?;

    if !allowed {
        let mut hasher = std::hash::DefaultHasher::new();
        addr.ip().hash(&mut hasher);
        let ip_hash = format!("{:x}", hasher.finish());
        tracing::warn!(action = "rate_limited", endpoint, ip_hash = %ip_hash, "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    Ok(())
}

/// `Set-Cookie` value for a session id; an empty id with `max_age = 0`
/// clears the cookie.
fn session_cookie(value: &str, max_age: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, value, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// GET /api/auth/nonce - Issue a single-use sign-in nonce
pub async fn get_nonce(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&state, &addr, "auth/nonce").await?;

    let nonce = state.auth.issue_nonce().await?;

    Ok(Json(NonceResponse {
        nonce: nonce.value,
        expires_at: nonce.expires_at,
    }))
}

/// POST /api/auth/siwe - Verify a signed sign-in message and open a session
pub async fn authenticate_siwe(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<SiweRequest>,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&state, &addr, "auth/siwe").await?;

    let authenticated = state
        .auth
        .authenticate(req.message.as_bytes(), &req.signature)
        .await?;

    let cookie = session_cookie(
        &authenticated.session.id,
        state.auth.settings().session_ttl.as_secs(),
        state.config.cookie_secure,
    );

    let body = SiweResponse {
        session_id: authenticated.session.id.clone(),
        expires_at: authenticated.session.expires_at,
        user: UserInfo::from(&authenticated.user),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// GET /api/auth/me - Describe the current session
pub async fn me(session: AuthSession) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: session.user_id,
        wallet_address: session.wallet_address,
    })
}

/// POST /api/auth/logout - Invalidate current session
pub async fn logout(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.logout(&session.session_id).await?;

    tracing::info!(action = "logout", user_id = %session.user_id, "User logged out");

    let cookie = session_cookie("", 0, state.config.cookie_secure);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}
