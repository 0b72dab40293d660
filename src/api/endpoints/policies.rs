//! Policy endpoints.
//!
//! - `GET    /api/policies`             : catalogue
//! - `GET    /api/policies/:id`         : policy with its versions
//! - `PATCH  /api/policies/:id`         : status / category (admin|publisher)
//! - `DELETE /api/policies/:id`         : cascading delete (admin|publisher)
//! - `GET    /api/policies/:id/approval`: completion statistics
//! - `POST   /api/policies/:id/attest`  : sign the current version

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Caller};
use crate::approval::{self, ApprovalReport};
use crate::models::{Attestation, Policy, PolicyUpdate, PolicyVersion};
use crate::settings;

fn parse_policy_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid policy ID: {e}")))
}

/// `GET /api/policies`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Policy>>, ApiError> {
    Ok(Json(ctx.core.store.list_policies()?))
}

#[derive(Serialize)]
pub struct PolicyDetailResponse {
    pub policy: Policy,
    pub current_version: Option<PolicyVersion>,
    pub versions: Vec<PolicyVersion>,
}

/// `GET /api/policies/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(policy_id): Path<String>,
) -> Result<Json<PolicyDetailResponse>, ApiError> {
    let id = parse_policy_id(&policy_id)?;
    let policy = ctx
        .core
        .store
        .get_policy(&id)?
        .ok_or_else(|| ApiError::NotFound("Policy not found".into()))?;
    let versions = ctx.core.store.list_versions(&id)?;
    let current_version = policy
        .current_version_id
        .and_then(|vid| versions.iter().find(|v| v.id == vid).cloned());

    Ok(Json(PolicyDetailResponse {
        policy,
        current_version,
        versions,
    }))
}

/// `PATCH /api/policies/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(policy_id): Path<String>,
    Json(update): Json<PolicyUpdate>,
) -> Result<Json<Policy>, ApiError> {
    let id = parse_policy_id(&policy_id)?;
    let policy = settings::update_policy_settings(ctx.core.store.as_ref(), caller.claims(), &id, update)?;
    Ok(Json(policy))
}

/// `DELETE /api/policies/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(policy_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_policy_id(&policy_id)?;
    settings::delete_policy(ctx.core.store.as_ref(), caller.claims(), &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/policies/:id/approval`
///
/// Aggregation failures degrade to an all-zero report.
pub async fn approval(
    State(ctx): State<ApiContext>,
    Path(policy_id): Path<String>,
) -> Result<Json<ApprovalReport>, ApiError> {
    let id = parse_policy_id(&policy_id)?;
    Ok(Json(approval::aggregate_or_default(
        ctx.core.store.as_ref(),
        &id,
        Utc::now(),
    )))
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct AttestRequest {
    pub assessment_passed: Option<bool>,
}

/// `POST /api/policies/:id/attest`
pub async fn attest(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(policy_id): Path<String>,
    body: Option<Json<AttestRequest>>,
) -> Result<(StatusCode, Json<Attestation>), ApiError> {
    let id = parse_policy_id(&policy_id)?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let attestation = settings::attest_policy(
        ctx.core.store.as_ref(),
        caller.claims(),
        &id,
        request.assessment_passed,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(attestation)))
}
