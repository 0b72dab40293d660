//! Administrative endpoints.
//!
//! These routes sit outside the auth middleware and authorize from the
//! `Authorization` header themselves, so that a missing token (401) and a
//! wrong role (403) are reported separately per utility.

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;

use crate::admin::{
    self, AddUsersOutcome, AddUsersRequest, CleanupOutcome, PopulationOutcome, PopulationPlan,
    SampleUploadOutcome, ADMIN_ONLY, PUBLISHERS,
};
use crate::api::error::ApiError;
use crate::api::types::{run_blocking, ApiContext};
use crate::identity::Claims;
use crate::models::Role;

fn authorize(ctx: &ApiContext, headers: &HeaderMap, allowed: &[Role]) -> Result<Claims, ApiError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    Ok(admin::authorize(ctx.core.identity.as_ref(), authorization, allowed)?)
}

/// `POST /api/admin/add-users-to-group`
pub async fn add_users_to_group(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    body: Option<Json<AddUsersRequest>>,
) -> Result<Json<AddUsersOutcome>, ApiError> {
    authorize(&ctx, &headers, ADMIN_ONLY)?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = run_blocking(move || {
        admin::add_users_to_group(&ctx.core, &request).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(outcome))
}

/// `POST /api/admin/cleanup-users`
pub async fn cleanup_users(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<Json<CleanupOutcome>, ApiError> {
    let caller = authorize(&ctx, &headers, ADMIN_ONLY)?;
    Ok(Json(admin::cleanup_users(&ctx.core, &caller)?))
}

/// `POST /api/admin/populate-test-data`
pub async fn populate_test_data(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<Json<PopulationOutcome>, ApiError> {
    authorize(&ctx, &headers, ADMIN_ONLY)?;
    let outcome = run_blocking(move || {
        admin::populate_test_data(&ctx.core, &PopulationPlan::default()).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(outcome))
}

/// `POST /api/admin/upload-sample-policies`
pub async fn upload_sample_policies(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<Json<SampleUploadOutcome>, ApiError> {
    authorize(&ctx, &headers, PUBLISHERS)?;
    Ok(Json(admin::upload_sample_policies(&ctx.core)?))
}
