//! Audit logging middleware.
//!
//! Logs every API request with the caller, method, path and response
//! status. Runs innermost (after auth has injected `Caller`).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::Caller;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let caller = req
        .extensions()
        .get::<Caller>()
        .map(|c| c.claims().sub.to_string())
        .unwrap_or_else(|| "anonymous".into());

    let response = next.run(req).await;

    let status = response.status().as_u16();
    if response.status().is_server_error() {
        tracing::warn!(%caller, %method, %path, status, "API access");
    } else {
        tracing::info!(%caller, %method, %path, status, "API access");
    }
    response
}
