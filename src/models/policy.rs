use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PolicyStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: PolicyStatus,
    pub current_version_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Policy {
    /// A fresh draft policy with no version yet.
    pub fn draft(title: impl Into<String>, category: Option<String>, created_by: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            category,
            status: PolicyStatus::Draft,
            current_version_id: None,
            created_by,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyVersion {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub version_number: i64,
    pub file_name: String,
    pub file_size: i64,
    pub file_url: String,
    pub change_summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Partial update applied by the policy settings screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub status: Option<PolicyStatus>,
    pub category: Option<String>,
}

impl PolicyUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.category.is_none()
    }
}
