//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it through the
//! identity provider, and injects [`Caller`] into request extensions for
//! downstream handlers.

use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Caller};
use crate::identity::{bearer_token, IdentityError};

/// Require a valid bearer token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = bearer_token(header_value).ok_or(ApiError::Unauthorized)?;

    let claims = match ctx.core.identity.verify(token) {
        Ok(claims) => claims,
        Err(IdentityError::InvalidToken) => return Err(ApiError::Unauthorized),
        Err(e) => return Err(e.into()),
    };

    req.extensions_mut().insert(Caller(claims));
    Ok(next.run(req).await)
}
