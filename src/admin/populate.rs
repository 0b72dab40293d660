//! Demo environment: five staff groups, a few hundred accounts and a
//! large catalogue of published policies.

use serde::Serialize;
use uuid::Uuid;

use super::users::create_member;
use super::AdminError;
use crate::config::USER_BATCH_SIZE;
use crate::core_state::CoreState;
use crate::identity::IdentityError;
use crate::models::{Group, GroupMember, Policy, PolicyStatus, Profile, Role};

pub const DEMO_EMAIL_DOMAIN: &str = "@apex-demo.com";
pub const DEMO_PASSWORD: &str = "Demo123!";

const POLICY_BATCH_SIZE: usize = 50;

pub const POLICY_CATEGORIES: [&str; 15] = [
    "Code of Conduct",
    "Data Security",
    "Remote Work",
    "Expense Reimbursement",
    "Leave Policy",
    "Health & Safety",
    "IT Security",
    "Procurement",
    "Training & Development",
    "Performance Management",
    "Client Relations",
    "Conflict of Interest",
    "Confidentiality",
    "Workplace Harassment",
    "Emergency Procedures",
];

#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    pub name: String,
    pub description: String,
    pub user_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationPlan {
    pub groups: Vec<GroupPlan>,
    pub policy_count: usize,
}

impl Default for PopulationPlan {
    fn default() -> Self {
        let group = |name: &str, description: &str, user_count| GroupPlan {
            name: name.into(),
            description: description.into(),
            user_count,
        };
        Self {
            groups: vec![
                group("Admin", "Administrative staff", 10),
                group("Directors", "Department directors", 10),
                group("Executive Directors", "Executive leadership", 5),
                group("Supervisor Probation Officers", "Supervisory staff", 50),
                group("Probation Officers", "Front-line probation officers", 221),
            ],
            policy_count: 798,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulationStats {
    pub groups: usize,
    pub users: usize,
    pub policies: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInfo {
    pub message: String,
    pub example_users: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationOutcome {
    pub success: bool,
    pub message: String,
    pub stats: PopulationStats,
    pub login_info: LoginInfo,
}

pub fn policy_title(index: usize) -> String {
    let category = POLICY_CATEGORIES[index % POLICY_CATEGORIES.len()];
    format!("{category} Policy - Version {}", index / POLICY_CATEGORIES.len() + 1)
}

fn policy_description(category: &str) -> String {
    format!(
        "This policy outlines the guidelines and procedures for {} within the organization. All employees must review and acknowledge this policy.",
        category.to_lowercase()
    )
}

fn demo_email(index: usize) -> String {
    format!("user{index}{DEMO_EMAIL_DOMAIN}")
}

/// Remove demo accounts and the plan's groups from a previous run.
fn clear_previous_run(state: &CoreState, plan: &PopulationPlan) -> Result<(), AdminError> {
    let demo_ids: Vec<Uuid> = state
        .identity
        .list_users()?
        .into_iter()
        .filter(|u| u.email.contains(DEMO_EMAIL_DOMAIN))
        .map(|u| u.id)
        .collect();
    tracing::info!(count = demo_ids.len(), "Existing demo users to delete");

    if !demo_ids.is_empty() {
        state.store.purge_users(&demo_ids)?;
    }
    let names: Vec<&str> = plan.groups.iter().map(|g| g.name.as_str()).collect();
    state.store.delete_groups_named(&names)?;

    for id in &demo_ids {
        if let Err(e) = state.identity.delete_user(id) {
            tracing::error!(user_id = %id, error = %e, "Failed to delete demo account");
        }
    }
    Ok(())
}

/// Create (or re-adopt) one demo account and return its id.
fn demo_member(
    state: &CoreState,
    group: &Group,
    email: &str,
    full_name: &str,
) -> Result<Uuid, AdminError> {
    let role = if group.name == "Admin" { Role::Admin } else { Role::Employee };
    match create_member(state, group, email, full_name, role, Some(&group.name)) {
        Err(AdminError::Identity(IdentityError::AlreadyRegistered)) => {
            let user = state
                .identity
                .find_user_by_email(email)?
                .ok_or(AdminError::Identity(IdentityError::AlreadyRegistered))?;
            tracing::info!(email = %email, "User already exists, reusing");
            state.store.upsert_profile(&Profile {
                id: user.id,
                email: user.email,
                full_name: full_name.into(),
                department: Some(group.name.clone()),
                role,
            })?;
            state.store.add_group_member(&GroupMember {
                group_id: group.id,
                user_id: user.id,
            })?;
            Ok(user.id)
        }
        other => other,
    }
}

/// Wipe the previous demo data set and build a fresh one from `plan`.
///
/// Accounts are numbered `user1@apex-demo.com` upwards across groups in
/// plan order; members of the `Admin` group get the admin role. Policies
/// cycle through the fifteen categories and are created by the first
/// account.
pub fn populate_test_data(
    state: &CoreState,
    plan: &PopulationPlan,
) -> Result<PopulationOutcome, AdminError> {
    tracing::info!(
        groups = plan.groups.len(),
        policies = plan.policy_count,
        "Starting demo data population"
    );
    clear_previous_run(state, plan)?;

    let mut created_groups = Vec::with_capacity(plan.groups.len());
    for group_plan in &plan.groups {
        let group = Group::new(group_plan.name.clone(), Some(group_plan.description.clone()));
        state.store.insert_group(&group)?;
        created_groups.push(group);
    }

    let mut user_index = 1;
    let mut all_users = Vec::new();
    let mut example_users = Vec::with_capacity(plan.groups.len());
    for (group, group_plan) in created_groups.iter().zip(&plan.groups) {
        if group_plan.user_count > 0 {
            example_users.push(format!("{} ({})", demo_email(user_index), group.name));
        }
        let numbers: Vec<usize> = (1..=group_plan.user_count).collect();
        for batch in numbers.chunks(USER_BATCH_SIZE) {
            for &n in batch {
                let email = demo_email(user_index);
                let full_name = format!("{} User {n}", group.name);
                match demo_member(state, group, &email, &full_name) {
                    Ok(id) => all_users.push(id),
                    Err(e) => tracing::error!(email = %email, error = %e, "Failed to create demo user"),
                }
                user_index += 1;
            }
        }
        tracing::info!(group = %group.name, members = group_plan.user_count, "Group populated");
    }
    tracing::info!(users = all_users.len(), "Demo users created");

    let author = all_users.first().copied();
    for index in 0..plan.policy_count {
        let category = POLICY_CATEGORIES[index % POLICY_CATEGORIES.len()];
        let mut policy = Policy::draft(policy_title(index), Some(category.into()), author);
        policy.description = Some(policy_description(category));
        policy.status = PolicyStatus::Published;
        state.store.insert_policy(&policy)?;
        if (index + 1) % POLICY_BATCH_SIZE == 0 {
            tracing::debug!(created = index + 1, "Policies created");
        }
    }
    tracing::info!(policies = plan.policy_count, "Demo policies created");

    Ok(PopulationOutcome {
        success: true,
        message: "Test data populated successfully".into(),
        stats: PopulationStats {
            groups: created_groups.len(),
            users: all_users.len(),
            policies: plan.policy_count,
        },
        login_info: LoginInfo {
            message: format!("You can login with any user. All passwords are: {DEMO_PASSWORD}"),
            example_users,
        },
    })
}
