use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who an assignment obliges to attest. A row targets a user or a group,
/// never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AssignmentTarget {
    User(Uuid),
    Group(Uuid),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyAssignment {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub target: AssignmentTarget,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_by: Option<Uuid>,
}

impl PolicyAssignment {
    pub fn new(policy_id: Uuid, target: AssignmentTarget, due_date: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            policy_id,
            target,
            due_date,
            assigned_by: None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self.target {
            AssignmentTarget::User(id) => Some(id),
            AssignmentTarget::Group(_) => None,
        }
    }

    pub fn group_id(&self) -> Option<Uuid> {
        match self.target {
            AssignmentTarget::Group(id) => Some(id),
            AssignmentTarget::User(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub policy_version_id: Uuid,
    pub signed_at: DateTime<Utc>,
    pub assessment_passed: Option<bool>,
}

/// Attestation joined with the signer's profile, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationRecord {
    pub attestation: Attestation,
    pub full_name: Option<String>,
    pub email: Option<String>,
}
