//! Response headers for a JSON-only auth API.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Add security headers to every response.
///
/// Responses carry session ids and nonces, so nothing may be cached.
/// The API never serves documents; the CSP forbids loading anything.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    response
}
