//! Upload-to-publish orchestration for policy documents.
//!
//! read → validate → convert → extract + normalize → override → wrap →
//! rasterize → upload → policy row → version row → current version.
//!
//! Steps after the upload are not transactional with it. When a later
//! step fails the stored PDF stays behind; its key is logged so it can be
//! cleaned up by hand.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::docx::CodecError;
use super::filename::{docx_stem, is_docx_name, make_pdf_name};
use super::metadata::{extract_policy_meta, PolicyMeta};
use super::normalize::normalize_policy_html;
use super::render::{PolicyDocument, RenderError};
use crate::core_state::CoreState;
use crate::db::DatabaseError;
use crate::models::{Policy, PolicyVersion};
use crate::storage::{formatted_key, StorageError, StoredObject, PDF_CONTENT_TYPE, POLICY_BUCKET};

/// Body used when conversion yields no markup at all.
pub const EMPTY_BODY: &str = "<p>(No content parsed)</p>";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Failed to read the .docx file")]
    Parse(#[source] CodecError),

    #[error("PDF rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Export failed while trying to {step}: {source}")]
    Persist {
        step: &'static str,
        #[source]
        source: DatabaseError,
    },
}

impl PipelineError {
    fn persist(step: &'static str) -> impl FnOnce(DatabaseError) -> Self {
        move |source| PipelineError::Persist { step, source }
    }
}

/// Parsed, normalized document awaiting review before export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyPreview {
    pub meta: PolicyMeta,
    pub body_html: String,
    pub messages: Vec<String>,
}

/// Everything the export needs besides the collaborators.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Attach the new version to this policy instead of creating one.
    pub policy_id: Option<Uuid>,
    pub category: Option<String>,
    pub version_number: Option<i64>,
    pub change_summary: Option<String>,
    pub section: Option<String>,
    pub number: Option<String>,
    pub subject: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub policy: Policy,
    pub version: PolicyVersion,
    pub object: StoredObject,
    pub meta: PolicyMeta,
    pub pdf_name: String,
    pub messages: Vec<String>,
}

/// Stages 1–2: convert, extract header fields, normalize the body.
pub fn preview_policy_document(
    state: &CoreState,
    bytes: &[u8],
    file_name: &str,
) -> Result<PolicyPreview, PipelineError> {
    if !is_docx_name(file_name) {
        return Err(PipelineError::InvalidInput(
            "Please choose a .docx file".to_string(),
        ));
    }
    if bytes.is_empty() {
        return Err(PipelineError::InvalidInput("The uploaded file is empty".to_string()));
    }

    let converted = state.codec.to_html(bytes).map_err(|e| {
        tracing::warn!(file_name, error = %e, "DOCX conversion failed");
        PipelineError::Parse(e)
    })?;

    let meta = extract_policy_meta(&converted.raw_text);
    let html = if converted.html.trim().is_empty() {
        EMPTY_BODY
    } else {
        converted.html.as_str()
    };
    let body_html = normalize_policy_html(html);

    tracing::debug!(
        file_name,
        section = %meta.section,
        number = %meta.number,
        subject = %meta.subject,
        messages = converted.messages.len(),
        "Parsed policy document"
    );

    Ok(PolicyPreview {
        meta,
        body_html,
        messages: converted.messages,
    })
}

/// Full pipeline: format the uploaded DOCX as a PDF, store it, and record
/// it as the current version of a new or existing policy.
pub fn export_policy_document(
    state: &CoreState,
    request: &ExportRequest,
    now: DateTime<Utc>,
) -> Result<ExportOutcome, PipelineError> {
    if let Some(id) = request.policy_id {
        let exists = state
            .store
            .get_policy(&id)
            .map_err(PipelineError::persist("look up the policy"))?
            .is_some();
        if !exists {
            return Err(PipelineError::InvalidInput(format!("Policy {id} does not exist")));
        }
    }

    let preview = preview_policy_document(state, &request.bytes, &request.file_name)?;
    let meta = preview.meta.with_overrides(
        request.section.as_deref(),
        request.number.as_deref(),
        request.subject.as_deref(),
    );

    let document = PolicyDocument::new(meta.clone(), preview.body_html);
    let pdf = state.rasterizer.rasterize(&document)?;

    let pdf_name = make_pdf_name(&meta.number, &meta.subject, &request.file_name);
    let key = formatted_key(now.timestamp_millis(), &pdf_name);
    let object = state
        .objects
        .put(POLICY_BUCKET, &key, &pdf, PDF_CONTENT_TYPE, false)?;
    tracing::info!(key = %object.key, size = object.size, "Uploaded formatted policy");

    let orphaned = |e: PipelineError| {
        tracing::warn!(bucket = POLICY_BUCKET, key = %key, error = %e, "Export failed after upload; stored PDF is orphaned");
        e
    };

    let policy = match request.policy_id {
        Some(id) => state
            .store
            .get_policy(&id)
            .map_err(PipelineError::persist("reload the policy"))
            .and_then(|p| {
                p.ok_or_else(|| PipelineError::InvalidInput(format!("Policy {id} does not exist")))
            })
            .map_err(orphaned)?,
        None => {
            let title = match meta.subject.trim() {
                "" => docx_stem(&request.file_name).trim().to_string(),
                subject => subject.to_string(),
            };
            let category = request
                .category
                .clone()
                .filter(|c| !c.trim().is_empty())
                .or_else(|| Some(meta.section.clone()).filter(|s| !s.is_empty()));
            let mut policy = Policy::draft(title, category, request.created_by);
            policy.created_at = now;
            state
                .store
                .insert_policy(&policy)
                .map_err(PipelineError::persist("create the policy"))
                .map_err(orphaned)?;
            policy
        }
    };

    let version_number = match request.version_number {
        Some(n) => n,
        None => state
            .store
            .next_version_number(&policy.id)
            .map_err(PipelineError::persist("number the version"))
            .map_err(orphaned)?,
    };

    let version = PolicyVersion {
        id: Uuid::new_v4(),
        policy_id: policy.id,
        version_number,
        file_name: pdf_name.clone(),
        file_size: object.size as i64,
        file_url: object.public_url.clone(),
        change_summary: request.change_summary.clone(),
        published_at: Some(now),
        created_at: now,
    };
    state
        .store
        .insert_version(&version)
        .map_err(PipelineError::persist("record the version"))
        .map_err(orphaned)?;
    state
        .store
        .set_current_version(&policy.id, &version.id)
        .map_err(PipelineError::persist("set the current version"))
        .map_err(orphaned)?;

    let policy = Policy {
        current_version_id: Some(version.id),
        ..policy
    };
    tracing::info!(
        policy_id = %policy.id,
        version = version.version_number,
        file = %pdf_name,
        "Published formatted policy version"
    );

    Ok(ExportOutcome {
        policy,
        version,
        object,
        meta,
        pdf_name,
        messages: preview.messages,
    })
}
