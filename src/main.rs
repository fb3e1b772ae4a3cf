//! walletauth application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to Redis (expiring store + user directory)
//! 3. Build the auth coordinator and shared state
//! 4. Build router with API routes, CORS and security headers
//! 5. Start Axum server

use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use walletauth::{
    auth::{middleware::AppState, AuthCoordinator, AuthSettings},
    config::Config,
    middleware::security_headers,
    routes,
    storage::{RedisStore, RedisUserDirectory},
};

/// Largest accepted request body; a sign-in message is a few hundred bytes.
const MAX_BODY_BYTES: usize = 16 * 1024;

fn cors_layer(allowed_origin: Option<HeaderValue>) -> CorsLayer {
    match allowed_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
        // No allowed origins: every CORS preflight is rejected.
        None => CorsLayer::new(),
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting walletauth on {} for domain {}", config.bind_addr, config.domain);

    // Connect to Redis
    let store = RedisStore::connect(&config.redis_url)
        .await
        .expect("Failed to connect to Redis");
    let users = RedisUserDirectory::new(store.connection());

    let store = Arc::new(store);
    let auth = AuthCoordinator::new(store.clone(), Arc::new(users), AuthSettings::from(&config));

    // Build shared state
    let state = AppState {
        auth,
        store,
        config: Arc::new(config.clone()),
    };

    let allowed_origin = config
        .allowed_origin
        .as_deref()
        .map(HeaderValue::from_str)
        .transpose()
        .expect("ALLOWED_ORIGIN is validated when config loads");

    let app = routes::api_router()
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(allowed_origin))
        .layer(axum::middleware::from_fn(security_headers))
        .with_state(state);

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", config.bind_addr);

    // Start server (with_connect_info required for ConnectInfo<SocketAddr> extractors)
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
