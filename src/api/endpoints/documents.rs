//! Policy document endpoints: Word upload → formatted PDF.
//!
//! `POST /api/documents/preview`: parse + normalize, nothing stored
//! `POST /api/documents/export` : full pipeline, returns the new version
//!
//! Both take the `.docx` as base64 in the JSON body and require the
//! admin or publisher role.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{decode_upload, run_blocking, ApiContext, Caller};
use crate::document::{self, ExportOutcome, ExportRequest, PolicyPreview};

#[derive(Deserialize)]
pub struct PreviewRequest {
    pub file_name: String,
    /// Base64 file body, optionally as a data URL.
    pub data: String,
}

/// `POST /api/documents/preview`
pub async fn preview(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<PreviewRequest>,
) -> Result<Json<PolicyPreview>, ApiError> {
    caller.require_publisher()?;
    let bytes = decode_upload(&payload.data)?;
    let preview = run_blocking(move || {
        document::preview_policy_document(&ctx.core, &bytes, &payload.file_name).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(preview))
}

#[derive(Deserialize)]
pub struct ExportPayload {
    pub file_name: String,
    pub data: String,
    #[serde(default)]
    pub policy_id: Option<Uuid>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub version_number: Option<i64>,
    #[serde(default)]
    pub change_summary: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// `POST /api/documents/export`
pub async fn export(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<ExportPayload>,
) -> Result<Json<ExportOutcome>, ApiError> {
    caller.require_publisher()?;
    let request = ExportRequest {
        bytes: decode_upload(&payload.data)?,
        file_name: payload.file_name,
        policy_id: payload.policy_id,
        category: payload.category,
        version_number: payload.version_number,
        change_summary: payload.change_summary,
        section: payload.section,
        number: payload.number,
        subject: payload.subject,
        created_by: Some(caller.claims().sub),
    };
    let outcome = run_blocking(move || {
        document::export_policy_document(&ctx.core, &request, Utc::now()).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(outcome))
}
