//! Authentication endpoints.
//!
//! `POST /api/auth/login`: Unprotected: email + password → bearer session
//! `GET  /api/auth/me`   : Protected: the caller's claims and profile

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{run_blocking, ApiContext, Caller};
use crate::identity::{Claims, Session};
use crate::models::Profile;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Session>, ApiError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".into()));
    }
    let session = run_blocking(move || {
        ctx.core
            .identity
            .login(&request.email, &request.password)
            .map_err(ApiError::from)
    })
    .await?;
    tracing::info!(user_id = %session.user_id, "User signed in");
    Ok(Json(session))
}

#[derive(Serialize)]
pub struct MeResponse {
    pub claims: Claims,
    pub profile: Option<Profile>,
}

/// `GET /api/auth/me`
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<MeResponse>, ApiError> {
    let profile = ctx.core.store.get_profile(&caller.claims().sub)?;
    Ok(Json(MeResponse {
        claims: caller.0,
        profile,
    }))
}
