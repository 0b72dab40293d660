use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::AdminError;
use crate::core_state::CoreState;
use crate::models::{Policy, PolicyVersion};
use crate::storage::{policy_key, PDF_CONTENT_TYPE, POLICY_BUCKET};

/// Title keyword → sample file. The first matching keyword wins.
pub const SAMPLE_POLICIES: [(&str, &str); 4] = [
    ("code of conduct", "code_of_conduct.pdf"),
    ("data", "data_security.pdf"),
    ("expense", "expense_reimbursement.pdf"),
    ("remote", "remote_work.pdf"),
];

const SAMPLE_CHANGE_SUMMARY: &str = "Initial version uploaded with sample document";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleUploadOutcome {
    pub success: bool,
    pub message: String,
    pub uploaded_count: usize,
}

pub fn sample_for_title(title: &str) -> Option<&'static str> {
    let title = title.to_lowercase();
    SAMPLE_POLICIES
        .iter()
        .find(|(keyword, _)| title.contains(keyword))
        .map(|(_, file)| *file)
}

/// Attach a sample PDF from the samples directory to every policy whose
/// title matches a keyword.
///
/// The file is stored at `{policy_id}/{file}`, overwriting any earlier
/// copy. A policy without a current version gets a new one; otherwise the
/// current version's file fields are repointed. Per-policy failures are
/// logged and skipped.
pub fn upload_sample_policies(state: &CoreState) -> Result<SampleUploadOutcome, AdminError> {
    tracing::info!(dir = %state.samples_dir.display(), "Uploading sample policy documents");
    let mut cache: HashMap<&'static str, Option<Vec<u8>>> = HashMap::new();
    let mut uploaded_count = 0;

    for policy in state.store.list_policies()? {
        let Some(file) = sample_for_title(&policy.title) else {
            tracing::debug!(title = %policy.title, "No matching sample file");
            continue;
        };
        let bytes = cache.entry(file).or_insert_with(|| {
            match std::fs::read(state.samples_dir.join(file)) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::error!(file, error = %e, "Failed to read sample file");
                    None
                }
            }
        });
        let Some(bytes) = bytes.as_deref() else {
            continue;
        };

        match attach_sample(state, &policy, file, bytes) {
            Ok(()) => {
                uploaded_count += 1;
                tracing::info!(file, title = %policy.title, "Sample uploaded");
            }
            Err(e) => tracing::error!(policy_id = %policy.id, file, error = %e, "Sample upload failed"),
        }
    }

    Ok(SampleUploadOutcome {
        success: true,
        message: format!("Uploaded {uploaded_count} policy documents"),
        uploaded_count,
    })
}

fn attach_sample(
    state: &CoreState,
    policy: &Policy,
    file: &str,
    bytes: &[u8],
) -> Result<(), AdminError> {
    let key = policy_key(&policy.id, file);
    let object = state
        .objects
        .put(POLICY_BUCKET, &key, bytes, PDF_CONTENT_TYPE, true)?;
    let file_size = object.size as i64;

    match policy.current_version_id {
        Some(version_id) => {
            state
                .store
                .update_version_file(&version_id, file, file_size, &object.public_url)?;
        }
        None => {
            let now = Utc::now();
            let version = PolicyVersion {
                id: Uuid::new_v4(),
                policy_id: policy.id,
                version_number: state.store.next_version_number(&policy.id)?,
                file_name: file.into(),
                file_size,
                file_url: object.public_url,
                change_summary: Some(SAMPLE_CHANGE_SUMMARY.into()),
                published_at: None,
                created_at: now,
            };
            state.store.insert_version(&version)?;
            state.store.set_current_version(&policy.id, &version.id)?;
        }
    }
    Ok(())
}
