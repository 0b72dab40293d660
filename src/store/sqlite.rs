use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use uuid::Uuid;

use super::PolicyStore;
use crate::db::{self, DatabaseError};
use crate::models::*;

/// One SQLite connection shared by the store and the identity provider.
pub type SharedConnection = Arc<Mutex<Connection>>;

pub fn shared_connection(conn: Connection) -> SharedConnection {
    Arc::new(Mutex::new(conn))
}

/// `PolicyStore` over the repository functions in `db::repository`.
///
/// The connection lock is taken per call and never held across an await.
pub struct SqlitePolicyStore {
    conn: SharedConnection,
}

impl SqlitePolicyStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(shared_connection(db::open_database(path)?)))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(shared_connection(db::open_memory_database()?)))
    }

    pub fn connection(&self) -> SharedConnection {
        Arc::clone(&self.conn)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

impl PolicyStore for SqlitePolicyStore {
    fn insert_policy(&self, policy: &Policy) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::insert_policy(c, policy))
    }

    fn get_policy(&self, id: &Uuid) -> Result<Option<Policy>, DatabaseError> {
        self.with_conn(|c| db::get_policy(c, id))
    }

    fn list_policies(&self) -> Result<Vec<Policy>, DatabaseError> {
        self.with_conn(db::list_policies)
    }

    fn count_policies(&self) -> Result<i64, DatabaseError> {
        self.with_conn(db::count_policies)
    }

    fn update_policy(&self, id: &Uuid, update: &PolicyUpdate) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::update_policy(c, id, update))
    }

    fn set_current_version(&self, policy_id: &Uuid, version_id: &Uuid) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::set_current_version(c, policy_id, version_id))
    }

    fn delete_policy(&self, id: &Uuid) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::delete_policy_cascade(c, id))
    }

    fn insert_version(&self, version: &PolicyVersion) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::insert_version(c, version))
    }

    fn get_version(&self, id: &Uuid) -> Result<Option<PolicyVersion>, DatabaseError> {
        self.with_conn(|c| db::get_version(c, id))
    }

    fn list_versions(&self, policy_id: &Uuid) -> Result<Vec<PolicyVersion>, DatabaseError> {
        self.with_conn(|c| db::list_versions_for_policy(c, policy_id))
    }

    fn next_version_number(&self, policy_id: &Uuid) -> Result<i64, DatabaseError> {
        self.with_conn(|c| db::next_version_number(c, policy_id))
    }

    fn update_version_file(
        &self,
        id: &Uuid,
        file_name: &str,
        file_size: i64,
        file_url: &str,
    ) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::update_version_file(c, id, file_name, file_size, file_url))
    }

    fn insert_assignment(&self, assignment: &PolicyAssignment) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::insert_assignment(c, assignment))
    }

    fn list_assignments(&self, policy_id: &Uuid) -> Result<Vec<PolicyAssignment>, DatabaseError> {
        self.with_conn(|c| db::list_assignments_for_policy(c, policy_id))
    }

    fn insert_attestation(&self, attestation: &Attestation) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::insert_attestation(c, attestation))
    }

    fn list_attestations(&self, version_id: &Uuid) -> Result<Vec<AttestationRecord>, DatabaseError> {
        self.with_conn(|c| db::list_attestations_for_version(c, version_id))
    }

    fn insert_group(&self, group: &Group) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::insert_group(c, group))
    }

    fn find_group_by_name(&self, name: &str) -> Result<Option<Group>, DatabaseError> {
        self.with_conn(|c| db::find_group_by_name(c, name))
    }

    fn add_group_member(&self, member: &GroupMember) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::add_group_member(c, member))
    }

    fn list_group_members(&self, group_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        self.with_conn(|c| db::list_group_members(c, group_id))
    }

    fn delete_groups_named(&self, names: &[&str]) -> Result<usize, DatabaseError> {
        self.with_conn(|c| db::delete_groups_named(c, names))
    }

    fn upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::insert_profile(c, profile))
    }

    fn get_profile(&self, id: &Uuid) -> Result<Option<Profile>, DatabaseError> {
        self.with_conn(|c| db::get_profile(c, id))
    }

    fn list_profiles(&self) -> Result<Vec<Profile>, DatabaseError> {
        self.with_conn(db::list_profiles)
    }

    fn count_profiles(&self) -> Result<i64, DatabaseError> {
        self.with_conn(db::count_profiles)
    }

    fn purge_users_except(&self, keep: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        self.with_conn(|c| {
            let tx = c.unchecked_transaction()?;
            db::delete_attestations_except(&tx, keep)?;
            db::delete_user_assignments_except(&tx, keep)?;
            db::delete_group_members_except(&tx, keep)?;
            let removed: Vec<Uuid> = db::list_profiles(&tx)?
                .into_iter()
                .map(|p| p.id)
                .filter(|id| id != keep)
                .collect();
            db::delete_profiles(&tx, &removed)?;
            tx.commit()?;
            Ok(removed)
        })
    }

    fn purge_users(&self, user_ids: &[Uuid]) -> Result<usize, DatabaseError> {
        self.with_conn(|c| {
            let tx = c.unchecked_transaction()?;
            db::delete_attestations_for_users(&tx, user_ids)?;
            db::delete_assignments_for_users(&tx, user_ids)?;
            db::delete_group_members_for_users(&tx, user_ids)?;
            db::delete_policies_created_by(&tx, user_ids)?;
            let removed = db::delete_profiles(&tx, user_ids)?;
            tx.commit()?;
            Ok(removed)
        })
    }

    fn save_brief(&self, brief: &Brief) -> Result<(), DatabaseError> {
        self.with_conn(|c| db::upsert_brief(c, brief))
    }

    fn load_brief(&self, owner_id: &Uuid) -> Result<Option<Brief>, DatabaseError> {
        self.with_conn(|c| db::get_brief_for_owner(c, owner_id))
    }
}
