//! API route handlers.

pub mod auth;

use crate::auth::middleware::AppState;
use axum::{routing::get, routing::post, Json, Router};
use serde_json::{json, Value};

/// GET /healthz - Liveness check
async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        // Auth endpoints
        .route("/api/auth/nonce", get(auth::get_nonce))
        .route("/api/auth/siwe", post(auth::authenticate_siwe))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
}
