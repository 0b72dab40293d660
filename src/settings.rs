//! Policy administration: settings updates, deletion and sign-off.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::identity::Claims;
use crate::models::{Attestation, Policy, PolicyUpdate};
use crate::store::PolicyStore;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Only administrators and publishers can change policy settings")]
    Forbidden,

    #[error("Policy not found: {0}")]
    PolicyNotFound(Uuid),

    #[error("{0}")]
    InvalidInput(String),

    #[error("This policy has no published version to sign")]
    NoCurrentVersion,

    #[error("You have already signed this version")]
    AlreadyAttested,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

fn require_publisher(caller: &Claims) -> Result<(), SettingsError> {
    if caller.role.can_publish() {
        Ok(())
    } else {
        Err(SettingsError::Forbidden)
    }
}

fn not_found_as(policy_id: Uuid) -> impl FnOnce(DatabaseError) -> SettingsError {
    move |e| match e {
        DatabaseError::NotFound { .. } => SettingsError::PolicyNotFound(policy_id),
        other => other.into(),
    }
}

/// Change a policy's status and/or category, returning the updated row.
///
/// A blank category is rejected rather than clearing the field.
pub fn update_policy_settings(
    store: &dyn PolicyStore,
    caller: &Claims,
    policy_id: &Uuid,
    update: PolicyUpdate,
) -> Result<Policy, SettingsError> {
    require_publisher(caller)?;

    let update = PolicyUpdate {
        status: update.status,
        category: match update.category {
            Some(c) if c.trim().is_empty() => {
                return Err(SettingsError::InvalidInput("Category cannot be empty".into()))
            }
            other => other.map(|c| c.trim().to_string()),
        },
    };
    if update.is_empty() {
        return Err(SettingsError::InvalidInput("Nothing to update".into()));
    }

    store
        .update_policy(policy_id, &update)
        .map_err(not_found_as(*policy_id))?;
    tracing::info!(
        policy_id = %policy_id,
        status = ?update.status,
        category = ?update.category,
        by = %caller.sub,
        "Policy settings updated"
    );

    store
        .get_policy(policy_id)?
        .ok_or(SettingsError::PolicyNotFound(*policy_id))
}

/// Delete a policy together with its assignments, attestations and versions.
pub fn delete_policy(
    store: &dyn PolicyStore,
    caller: &Claims,
    policy_id: &Uuid,
) -> Result<(), SettingsError> {
    require_publisher(caller)?;
    store
        .delete_policy(policy_id)
        .map_err(not_found_as(*policy_id))?;
    tracing::info!(policy_id = %policy_id, by = %caller.sub, "Policy deleted");
    Ok(())
}

/// Record the caller's sign-off on the policy's current version.
pub fn attest_policy(
    store: &dyn PolicyStore,
    caller: &Claims,
    policy_id: &Uuid,
    assessment_passed: Option<bool>,
    now: DateTime<Utc>,
) -> Result<Attestation, SettingsError> {
    let policy = store
        .get_policy(policy_id)?
        .ok_or(SettingsError::PolicyNotFound(*policy_id))?;
    let version_id = policy
        .current_version_id
        .ok_or(SettingsError::NoCurrentVersion)?;

    let attestation = Attestation {
        id: Uuid::new_v4(),
        user_id: caller.sub,
        policy_version_id: version_id,
        signed_at: now,
        assessment_passed,
    };
    store.insert_attestation(&attestation).map_err(|e| match e {
        DatabaseError::ConstraintViolation(_) => SettingsError::AlreadyAttested,
        other => other.into(),
    })?;

    tracing::info!(
        policy_id = %policy_id,
        version_id = %version_id,
        user_id = %caller.sub,
        "Policy attested"
    );
    Ok(attestation)
}
