//! Brief editor endpoints.
//!
//! - `POST /api/briefs/import`: `.docx` → editor HTML
//! - `POST /api/briefs/export`: editor HTML → `.docx` (base64)
//! - `GET  /api/briefs/draft` : caller's saved draft
//! - `PUT  /api/briefs/draft` : save the caller's draft
//! - `GET  /api/briefs/new`   : fresh brief from the template
//! - `POST /api/briefs/intake`: intake form HTML

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{decode_upload, encode_download, run_blocking, ApiContext, Caller};
use crate::brief::{self, ImportedBrief, IntakeFormData};
use crate::models::Brief;

#[derive(Deserialize)]
pub struct ImportRequest {
    pub file_name: String,
    pub data: String,
}

/// `POST /api/briefs/import`
pub async fn import(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ImportRequest>,
) -> Result<Json<ImportedBrief>, ApiError> {
    let bytes = decode_upload(&payload.data)?;
    let imported = brief::import_docx(ctx.core.codec.as_ref(), &payload.file_name, &bytes)?;
    Ok(Json(imported))
}

#[derive(Deserialize)]
pub struct ExportRequest {
    pub title: String,
    pub content_html: String,
}

#[derive(Serialize)]
pub struct ExportResponse {
    pub file_name: String,
    pub content_type: &'static str,
    /// Base64 DOCX bytes.
    pub data: String,
}

/// `POST /api/briefs/export`
pub async fn export(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, ApiError> {
    let download = run_blocking(move || {
        brief::export_docx(ctx.core.codec.as_ref(), &payload.title, &payload.content_html)
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(ExportResponse {
        file_name: download.file_name,
        content_type: brief::DOCX_CONTENT_TYPE,
        data: encode_download(&download.bytes),
    }))
}

/// `GET /api/briefs/draft`
pub async fn load_draft(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Brief>, ApiError> {
    let draft = brief::load_draft(ctx.core.store.as_ref(), caller.claims().sub, Utc::now())?;
    Ok(Json(draft))
}

#[derive(Deserialize)]
pub struct SaveDraftRequest {
    pub title: String,
    pub content_html: String,
}

/// `PUT /api/briefs/draft`
pub async fn save_draft(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<SaveDraftRequest>,
) -> Result<Json<Brief>, ApiError> {
    let saved = brief::save_draft(
        ctx.core.store.as_ref(),
        caller.claims().sub,
        &payload.title,
        &payload.content_html,
        Utc::now(),
    )?;
    Ok(Json(saved))
}

/// `GET /api/briefs/new`
pub async fn new_brief(Extension(caller): Extension<Caller>) -> Json<Brief> {
    Json(brief::new_brief(caller.claims().sub, Utc::now()))
}

#[derive(Serialize)]
pub struct IntakeResponse {
    pub html: String,
}

/// `POST /api/briefs/intake`
pub async fn intake(Json(form): Json<IntakeFormData>) -> Json<IntakeResponse> {
    Json(IntakeResponse {
        html: brief::generate_intake_form_html(&form),
    })
}
