use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AdminError;
use crate::config::USER_BATCH_SIZE;
use crate::core_state::CoreState;
use crate::identity::Claims;
use crate::models::{Group, GroupMember, Profile, Role};

const SAMPLE_USER_PASSWORD: &str = "Password123!";
const MAX_USERS_PER_CALL: u32 = 500;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddUsersRequest {
    pub group_name: String,
    pub number_of_users: u32,
}

impl Default for AddUsersRequest {
    fn default() -> Self {
        Self {
            group_name: "Admin".into(),
            number_of_users: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUsersOutcome {
    pub success: bool,
    pub message: String,
    pub users: Vec<CreatedUser>,
    pub group_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOutcome {
    pub success: bool,
    pub message: String,
    pub deleted_users: usize,
}

/// Look a group up by name (case-insensitive), creating it when absent.
pub(super) fn find_or_create_group(
    state: &CoreState,
    name: &str,
    description: String,
) -> Result<Group, AdminError> {
    if let Some(group) = state.store.find_group_by_name(name)? {
        return Ok(group);
    }
    tracing::info!(group = %name, "Group not found, creating it");
    let group = Group::new(name, Some(description));
    state.store.insert_group(&group)?;
    Ok(group)
}

/// Create `user{N}@example.com` accounts and add them to a group.
///
/// Numbering continues after the current profile count. Accounts are
/// created in sequential batches of `USER_BATCH_SIZE`; a failure on one
/// account is logged and skipped.
pub fn add_users_to_group(
    state: &CoreState,
    request: &AddUsersRequest,
) -> Result<AddUsersOutcome, AdminError> {
    let group_name = request.group_name.trim();
    if group_name.is_empty() {
        return Err(AdminError::InvalidInput("Group name is required".into()));
    }
    if request.number_of_users == 0 || request.number_of_users > MAX_USERS_PER_CALL {
        return Err(AdminError::InvalidInput(format!(
            "numberOfUsers must be between 1 and {MAX_USERS_PER_CALL}"
        )));
    }

    tracing::info!(group = %group_name, count = request.number_of_users, "Adding users to group");
    let group = find_or_create_group(state, group_name, format!("{group_name} group for sample users"))?;

    let start = state.store.count_profiles()? + 1;
    let indices: Vec<i64> = (0..i64::from(request.number_of_users)).map(|i| start + i).collect();

    let mut users = Vec::with_capacity(indices.len());
    for (batch_no, batch) in indices.chunks(USER_BATCH_SIZE).enumerate() {
        tracing::debug!(batch = batch_no + 1, size = batch.len(), "Creating user batch");
        for &index in batch {
            let email = format!("user{index}@example.com");
            let full_name = format!("Test User {index}");
            match create_member(state, &group, &email, &full_name, Role::Employee, None) {
                Ok(_) => users.push(CreatedUser { email, full_name }),
                Err(e) => tracing::error!(email = %email, error = %e, "Failed to create sample user"),
            }
        }
    }

    tracing::info!(created = users.len(), group = %group.name, "Sample users created");
    Ok(AddUsersOutcome {
        success: true,
        message: format!("Created {} users in {} group", users.len(), group_name),
        users,
        group_id: group.id,
    })
}

/// Account + profile + membership for one user.
pub(super) fn create_member(
    state: &CoreState,
    group: &Group,
    email: &str,
    full_name: &str,
    role: Role,
    department: Option<&str>,
) -> Result<Uuid, AdminError> {
    let user = state.identity.create_user(email, SAMPLE_USER_PASSWORD)?;
    state.store.upsert_profile(&Profile {
        id: user.id,
        email: user.email,
        full_name: full_name.into(),
        department: department.map(str::to_string),
        role,
    })?;
    state.store.add_group_member(&GroupMember {
        group_id: group.id,
        user_id: user.id,
    })?;
    Ok(user.id)
}

/// Remove every user except the caller, along with their attestations,
/// direct assignments and group memberships.
pub fn cleanup_users(state: &CoreState, caller: &Claims) -> Result<CleanupOutcome, AdminError> {
    tracing::info!(protected = %caller.sub, "Starting user cleanup");
    let removed = state.store.purge_users_except(&caller.sub)?;
    tracing::info!(count = removed.len(), "Profiles removed");

    let mut deleted_users = 0;
    for id in &removed {
        match state.identity.delete_user(id) {
            Ok(()) => deleted_users += 1,
            Err(e) => tracing::error!(user_id = %id, error = %e, "Failed to delete account"),
        }
    }

    tracing::info!(deleted_users, "User cleanup complete");
    Ok(CleanupOutcome {
        success: true,
        message: "Cleanup completed successfully".into(),
        deleted_users,
    })
}
