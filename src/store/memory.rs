use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::PolicyStore;
use crate::db::DatabaseError;
use crate::models::*;

#[derive(Default)]
struct Tables {
    policies: Vec<Policy>,
    versions: Vec<PolicyVersion>,
    assignments: Vec<PolicyAssignment>,
    attestations: Vec<Attestation>,
    groups: Vec<Group>,
    members: Vec<GroupMember>,
    profiles: Vec<Profile>,
    briefs: Vec<Brief>,
}

impl Tables {
    fn remove_policy(&mut self, id: &Uuid) -> Result<(), DatabaseError> {
        if !self.policies.iter().any(|p| &p.id == id) {
            return Err(not_found("Policy", id));
        }
        let version_ids: Vec<Uuid> = self
            .versions
            .iter()
            .filter(|v| &v.policy_id == id)
            .map(|v| v.id)
            .collect();
        self.assignments.retain(|a| &a.policy_id != id);
        self.attestations
            .retain(|a| !version_ids.contains(&a.policy_version_id));
        self.versions.retain(|v| &v.policy_id != id);
        self.policies.retain(|p| &p.id != id);
        Ok(())
    }
}

fn not_found(entity_type: &str, id: &Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: entity_type.into(),
        id: id.to_string(),
    }
}

/// Vec-backed `PolicyStore` with the same ordering and uniqueness rules
/// as the SQLite schema.
#[derive(Default)]
pub struct MemoryPolicyStore {
    tables: Mutex<Tables>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, DatabaseError> {
        self.tables.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn insert_policy(&self, policy: &Policy) -> Result<(), DatabaseError> {
        let mut t = self.tables()?;
        if t.policies.iter().any(|p| p.id == policy.id) {
            return Err(DatabaseError::ConstraintViolation(format!(
                "policy {} already exists",
                policy.id
            )));
        }
        t.policies.push(policy.clone());
        Ok(())
    }

    fn get_policy(&self, id: &Uuid) -> Result<Option<Policy>, DatabaseError> {
        Ok(self.tables()?.policies.iter().find(|p| &p.id == id).cloned())
    }

    fn count_policies(&self) -> Result<i64, DatabaseError> {
        Ok(self.tables()?.policies.len() as i64)
    }

    fn list_policies(&self) -> Result<Vec<Policy>, DatabaseError> {
        let mut policies = self.tables()?.policies.clone();
        policies.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(policies)
    }

    fn update_policy(&self, id: &Uuid, update: &PolicyUpdate) -> Result<(), DatabaseError> {
        let mut t = self.tables()?;
        let policy = t
            .policies
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| not_found("Policy", id))?;
        if let Some(status) = update.status {
            policy.status = status;
        }
        if let Some(category) = &update.category {
            policy.category = Some(category.clone());
        }
        Ok(())
    }

    fn set_current_version(&self, policy_id: &Uuid, version_id: &Uuid) -> Result<(), DatabaseError> {
        let mut t = self.tables()?;
        let policy = t
            .policies
            .iter_mut()
            .find(|p| &p.id == policy_id)
            .ok_or_else(|| not_found("Policy", policy_id))?;
        policy.current_version_id = Some(*version_id);
        Ok(())
    }

    fn delete_policy(&self, id: &Uuid) -> Result<(), DatabaseError> {
        self.tables()?.remove_policy(id)
    }

    fn insert_version(&self, version: &PolicyVersion) -> Result<(), DatabaseError> {
        let mut t = self.tables()?;
        if !t.policies.iter().any(|p| p.id == version.policy_id) {
            return Err(DatabaseError::ConstraintViolation(format!(
                "version {} references missing policy {}",
                version.id, version.policy_id
            )));
        }
        let taken = t
            .versions
            .iter()
            .any(|v| v.policy_id == version.policy_id && v.version_number == version.version_number);
        if taken {
            return Err(DatabaseError::ConstraintViolation(format!(
                "policy {} already has version {}",
                version.policy_id, version.version_number
            )));
        }
        t.versions.push(version.clone());
        Ok(())
    }

    fn get_version(&self, id: &Uuid) -> Result<Option<PolicyVersion>, DatabaseError> {
        Ok(self.tables()?.versions.iter().find(|v| &v.id == id).cloned())
    }

    fn list_versions(&self, policy_id: &Uuid) -> Result<Vec<PolicyVersion>, DatabaseError> {
        let mut versions: Vec<PolicyVersion> = self
            .tables()?
            .versions
            .iter()
            .filter(|v| &v.policy_id == policy_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    fn next_version_number(&self, policy_id: &Uuid) -> Result<i64, DatabaseError> {
        let max = self
            .tables()?
            .versions
            .iter()
            .filter(|v| &v.policy_id == policy_id)
            .map(|v| v.version_number)
            .max();
        Ok(max.unwrap_or(0) + 1)
    }

    fn update_version_file(
        &self,
        id: &Uuid,
        file_name: &str,
        file_size: i64,
        file_url: &str,
    ) -> Result<(), DatabaseError> {
        let mut t = self.tables()?;
        let version = t
            .versions
            .iter_mut()
            .find(|v| &v.id == id)
            .ok_or_else(|| not_found("PolicyVersion", id))?;
        version.file_name = file_name.into();
        version.file_size = file_size;
        version.file_url = file_url.into();
        Ok(())
    }

    fn insert_assignment(&self, assignment: &PolicyAssignment) -> Result<(), DatabaseError> {
        self.tables()?.assignments.push(assignment.clone());
        Ok(())
    }

    fn list_assignments(&self, policy_id: &Uuid) -> Result<Vec<PolicyAssignment>, DatabaseError> {
        Ok(self
            .tables()?
            .assignments
            .iter()
            .filter(|a| &a.policy_id == policy_id)
            .cloned()
            .collect())
    }

    fn insert_attestation(&self, attestation: &Attestation) -> Result<(), DatabaseError> {
        let mut t = self.tables()?;
        let duplicate = t.attestations.iter().any(|a| {
            a.user_id == attestation.user_id && a.policy_version_id == attestation.policy_version_id
        });
        if duplicate {
            return Err(DatabaseError::ConstraintViolation(format!(
                "user {} already attested to version {}",
                attestation.user_id, attestation.policy_version_id
            )));
        }
        t.attestations.push(attestation.clone());
        Ok(())
    }

    fn list_attestations(&self, version_id: &Uuid) -> Result<Vec<AttestationRecord>, DatabaseError> {
        let t = self.tables()?;
        let mut records: Vec<AttestationRecord> = t
            .attestations
            .iter()
            .filter(|a| &a.policy_version_id == version_id)
            .map(|a| {
                let profile = t.profiles.iter().find(|p| p.id == a.user_id);
                AttestationRecord {
                    attestation: a.clone(),
                    full_name: profile.map(|p| p.full_name.clone()),
                    email: profile.map(|p| p.email.clone()),
                }
            })
            .collect();
        records.sort_by(|a, b| b.attestation.signed_at.cmp(&a.attestation.signed_at));
        Ok(records)
    }

    fn insert_group(&self, group: &Group) -> Result<(), DatabaseError> {
        self.tables()?.groups.push(group.clone());
        Ok(())
    }

    fn find_group_by_name(&self, name: &str) -> Result<Option<Group>, DatabaseError> {
        Ok(self
            .tables()?
            .groups
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn add_group_member(&self, member: &GroupMember) -> Result<(), DatabaseError> {
        let mut t = self.tables()?;
        if !t.members.contains(member) {
            t.members.push(*member);
        }
        Ok(())
    }

    fn list_group_members(&self, group_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        Ok(self
            .tables()?
            .members
            .iter()
            .filter(|m| &m.group_id == group_id)
            .map(|m| m.user_id)
            .collect())
    }

    fn delete_groups_named(&self, names: &[&str]) -> Result<usize, DatabaseError> {
        let mut t = self.tables()?;
        let ids: Vec<Uuid> = t
            .groups
            .iter()
            .filter(|g| names.contains(&g.name.as_str()))
            .map(|g| g.id)
            .collect();
        t.members.retain(|m| !ids.contains(&m.group_id));
        t.assignments
            .retain(|a| a.group_id().map_or(true, |g| !ids.contains(&g)));
        t.groups.retain(|g| !ids.contains(&g.id));
        Ok(ids.len())
    }

    fn upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        let mut t = self.tables()?;
        if t
            .profiles
            .iter()
            .any(|p| p.id != profile.id && p.email == profile.email)
        {
            return Err(DatabaseError::ConstraintViolation(format!(
                "email {} already in use",
                profile.email
            )));
        }
        match t.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => t.profiles.push(profile.clone()),
        }
        Ok(())
    }

    fn get_profile(&self, id: &Uuid) -> Result<Option<Profile>, DatabaseError> {
        Ok(self.tables()?.profiles.iter().find(|p| &p.id == id).cloned())
    }

    fn list_profiles(&self) -> Result<Vec<Profile>, DatabaseError> {
        let mut profiles = self.tables()?.profiles.clone();
        profiles.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(profiles)
    }

    fn count_profiles(&self) -> Result<i64, DatabaseError> {
        Ok(self.tables()?.profiles.len() as i64)
    }

    fn purge_users_except(&self, keep: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let mut t = self.tables()?;
        t.attestations.retain(|a| &a.user_id == keep);
        t.assignments
            .retain(|a| a.user_id().map_or(true, |u| &u == keep));
        t.members.retain(|m| &m.user_id == keep);
        let mut removed: Vec<Uuid> = t
            .profiles
            .iter()
            .filter(|p| &p.id != keep)
            .map(|p| p.id)
            .collect();
        t.profiles.retain(|p| &p.id == keep);
        removed.sort_by_key(|id| id.to_string());
        Ok(removed)
    }

    fn purge_users(&self, user_ids: &[Uuid]) -> Result<usize, DatabaseError> {
        let mut t = self.tables()?;
        t.attestations.retain(|a| !user_ids.contains(&a.user_id));
        t.assignments.retain(|a| {
            let targeted = a.user_id().is_some_and(|u| user_ids.contains(&u));
            let assigned = a.assigned_by.is_some_and(|u| user_ids.contains(&u));
            !targeted && !assigned
        });
        t.members.retain(|m| !user_ids.contains(&m.user_id));
        let authored: Vec<Uuid> = t
            .policies
            .iter()
            .filter(|p| p.created_by.is_some_and(|u| user_ids.contains(&u)))
            .map(|p| p.id)
            .collect();
        for id in &authored {
            t.remove_policy(id)?;
        }
        let before = t.profiles.len();
        t.profiles.retain(|p| !user_ids.contains(&p.id));
        Ok(before - t.profiles.len())
    }

    fn save_brief(&self, brief: &Brief) -> Result<(), DatabaseError> {
        let mut t = self.tables()?;
        match t.briefs.iter_mut().find(|b| b.owner_id == brief.owner_id) {
            Some(existing) => {
                existing.title = brief.title.clone();
                existing.content_html = brief.content_html.clone();
                existing.updated_at = brief.updated_at;
            }
            None => t.briefs.push(brief.clone()),
        }
        Ok(())
    }

    fn load_brief(&self, owner_id: &Uuid) -> Result<Option<Brief>, DatabaseError> {
        Ok(self
            .tables()?
            .briefs
            .iter()
            .find(|b| &b.owner_id == owner_id)
            .cloned())
    }
}
