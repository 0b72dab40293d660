//! Relational store seam.
//!
//! Every aggregator, pipeline and admin function reaches the policy tables
//! through `PolicyStore`. `SqlitePolicyStore` is the production backend;
//! `MemoryPolicyStore` backs tests and throwaway demo instances.

mod memory;
mod sqlite;

pub use memory::MemoryPolicyStore;
pub use sqlite::{shared_connection, SharedConnection, SqlitePolicyStore};

use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

/// Typed access to policies, versions, assignments, attestations, groups,
/// profiles and brief drafts.
pub trait PolicyStore: Send + Sync {
    // ── policies ────────────────────────────────────────────
    fn insert_policy(&self, policy: &Policy) -> Result<(), DatabaseError>;
    fn get_policy(&self, id: &Uuid) -> Result<Option<Policy>, DatabaseError>;
    fn list_policies(&self) -> Result<Vec<Policy>, DatabaseError>;
    fn count_policies(&self) -> Result<i64, DatabaseError>;
    fn update_policy(&self, id: &Uuid, update: &PolicyUpdate) -> Result<(), DatabaseError>;
    fn set_current_version(&self, policy_id: &Uuid, version_id: &Uuid) -> Result<(), DatabaseError>;
    /// Remove the policy after its assignments, attestations and versions.
    fn delete_policy(&self, id: &Uuid) -> Result<(), DatabaseError>;

    // ── versions ────────────────────────────────────────────
    fn insert_version(&self, version: &PolicyVersion) -> Result<(), DatabaseError>;
    fn get_version(&self, id: &Uuid) -> Result<Option<PolicyVersion>, DatabaseError>;
    fn list_versions(&self, policy_id: &Uuid) -> Result<Vec<PolicyVersion>, DatabaseError>;
    fn next_version_number(&self, policy_id: &Uuid) -> Result<i64, DatabaseError>;
    fn update_version_file(
        &self,
        id: &Uuid,
        file_name: &str,
        file_size: i64,
        file_url: &str,
    ) -> Result<(), DatabaseError>;

    // ── assignments & attestations ──────────────────────────
    fn insert_assignment(&self, assignment: &PolicyAssignment) -> Result<(), DatabaseError>;
    /// Assignments for a policy in the order they were made.
    fn list_assignments(&self, policy_id: &Uuid) -> Result<Vec<PolicyAssignment>, DatabaseError>;
    fn insert_attestation(&self, attestation: &Attestation) -> Result<(), DatabaseError>;
    /// Attestations for a version with signer details, most recent first.
    fn list_attestations(&self, version_id: &Uuid) -> Result<Vec<AttestationRecord>, DatabaseError>;

    // ── groups ──────────────────────────────────────────────
    fn insert_group(&self, group: &Group) -> Result<(), DatabaseError>;
    fn find_group_by_name(&self, name: &str) -> Result<Option<Group>, DatabaseError>;
    fn add_group_member(&self, member: &GroupMember) -> Result<(), DatabaseError>;
    fn list_group_members(&self, group_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError>;
    fn delete_groups_named(&self, names: &[&str]) -> Result<usize, DatabaseError>;

    // ── profiles ────────────────────────────────────────────
    fn upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError>;
    fn get_profile(&self, id: &Uuid) -> Result<Option<Profile>, DatabaseError>;
    fn list_profiles(&self) -> Result<Vec<Profile>, DatabaseError>;
    fn count_profiles(&self) -> Result<i64, DatabaseError>;

    /// Remove every user's data except `keep`: attestations, direct
    /// assignments, memberships, then profiles. Returns the removed
    /// profile ids so the caller can delete the matching identities.
    fn purge_users_except(&self, keep: &Uuid) -> Result<Vec<Uuid>, DatabaseError>;

    /// Remove the given users' attestations, assignments, memberships,
    /// the policies they created, and finally their profiles.
    fn purge_users(&self, user_ids: &[Uuid]) -> Result<usize, DatabaseError>;

    // ── briefs ──────────────────────────────────────────────
    fn save_brief(&self, brief: &Brief) -> Result<(), DatabaseError>;
    fn load_brief(&self, owner_id: &Uuid) -> Result<Option<Brief>, DatabaseError>;
}
