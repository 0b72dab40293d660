//! Approval status: who owes an attestation on a policy's current
//! version, who has signed, and who is late.
//!
//! Statistics are recomputed on every call; nothing here is persisted.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::RECENT_ATTESTATION_LIMIT;
use crate::db::DatabaseError;
use crate::models::{AssignmentTarget, AttestationRecord};
use crate::store::PolicyStore;

#[derive(Error, Debug)]
pub enum ApprovalError {
    #[error("Failed to load {step}: {source}")]
    Fetch {
        step: &'static str,
        #[source]
        source: DatabaseError,
    },
}

fn fetch<T>(step: &'static str, result: Result<T, DatabaseError>) -> Result<T, ApprovalError> {
    result.map_err(|source| ApprovalError::Fetch { step, source })
}

/// Invariants: `completed + pending == total_assigned`, `overdue <= pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApprovalStats {
    pub total_assigned: u32,
    pub completed: u32,
    pub pending: u32,
    pub overdue: u32,
}

impl ApprovalStats {
    /// Rounded completion percentage; 0 when nobody is assigned.
    pub fn completion_percentage(&self) -> u32 {
        if self.total_assigned == 0 {
            return 0;
        }
        (100.0 * f64::from(self.completed) / f64::from(self.total_assigned)).round() as u32
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApprovalReport {
    pub stats: ApprovalStats,
    pub completion_percentage: u32,
    /// Current-version attestations, most recent first.
    pub recent_attestations: Vec<AttestationRecord>,
}

/// Compute the approval report for `policy_id` as of `now`.
///
/// A missing policy, or one without a current version, has no obligations.
pub fn aggregate(
    store: &dyn PolicyStore,
    policy_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<ApprovalReport, ApprovalError> {
    let policy = fetch("policy", store.get_policy(policy_id))?;
    let Some(version_id) = policy.and_then(|p| p.current_version_id) else {
        return Ok(ApprovalReport::default());
    };

    // user -> effective due date; the first assignment to name a user wins
    let mut registered: HashMap<Uuid, Option<DateTime<Utc>>> = HashMap::new();
    for assignment in fetch("assignments", store.list_assignments(policy_id))? {
        match assignment.target {
            AssignmentTarget::User(user) => {
                registered.entry(user).or_insert(assignment.due_date);
            }
            AssignmentTarget::Group(group) => {
                for member in fetch("group members", store.list_group_members(&group))? {
                    registered.entry(member).or_insert(assignment.due_date);
                }
            }
        }
    }

    let attestations = fetch("attestations", store.list_attestations(&version_id))?;
    let attested: HashSet<Uuid> = attestations.iter().map(|r| r.attestation.user_id).collect();

    let mut stats = ApprovalStats {
        total_assigned: registered.len() as u32,
        ..ApprovalStats::default()
    };
    for (user, due) in &registered {
        if attested.contains(user) {
            stats.completed += 1;
        } else if due.is_some_and(|d| d < now) {
            stats.overdue += 1;
        }
    }
    stats.pending = stats.total_assigned - stats.completed;

    let mut recent_attestations = attestations;
    recent_attestations.truncate(RECENT_ATTESTATION_LIMIT);

    Ok(ApprovalReport {
        completion_percentage: stats.completion_percentage(),
        stats,
        recent_attestations,
    })
}

/// `aggregate`, logging any failure and falling back to an all-zero report.
pub fn aggregate_or_default(
    store: &dyn PolicyStore,
    policy_id: &Uuid,
    now: DateTime<Utc>,
) -> ApprovalReport {
    match aggregate(store, policy_id, now) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(policy_id = %policy_id, error = %e, "Approval aggregation failed");
            ApprovalReport::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use crate::store::MemoryPolicyStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    struct Fixture {
        store: MemoryPolicyStore,
        policy: Policy,
        version: PolicyVersion,
    }

    impl Fixture {
        fn new() -> Self {
            let store = MemoryPolicyStore::new();
            let policy = Policy::draft("Remote Work", None, None);
            store.insert_policy(&policy).unwrap();
            let version = PolicyVersion {
                id: Uuid::new_v4(),
                policy_id: policy.id,
                version_number: 1,
                file_name: "remote.pdf".into(),
                file_size: 1,
                file_url: "memory://remote.pdf".into(),
                change_summary: None,
                published_at: None,
                created_at: now(),
            };
            store.insert_version(&version).unwrap();
            store.set_current_version(&policy.id, &version.id).unwrap();
            Self { store, policy, version }
        }

        fn user(&self) -> Uuid {
            let id = Uuid::new_v4();
            self.store
                .upsert_profile(&Profile {
                    id,
                    email: format!("{id}@example.com"),
                    full_name: format!("User {id}"),
                    department: None,
                    role: Role::Employee,
                })
                .unwrap();
            id
        }

        fn assign(&self, target: AssignmentTarget, due: Option<DateTime<Utc>>) {
            self.store
                .insert_assignment(&PolicyAssignment::new(self.policy.id, target, due))
                .unwrap();
        }

        fn attest(&self, user: Uuid, at: DateTime<Utc>) {
            self.store
                .insert_attestation(&Attestation {
                    id: Uuid::new_v4(),
                    user_id: user,
                    policy_version_id: self.version.id,
                    signed_at: at,
                    assessment_passed: Some(true),
                })
                .unwrap();
        }

        fn report(&self) -> ApprovalReport {
            aggregate(&self.store, &self.policy.id, now()).unwrap()
        }
    }

    #[test]
    fn zero_assignments_is_all_zero() {
        let f = Fixture::new();
        let report = f.report();
        assert_eq!(report.stats, ApprovalStats::default());
        assert_eq!(report.completion_percentage, 0);
    }

    #[test]
    fn policy_without_current_version_is_all_zero() {
        let store = MemoryPolicyStore::new();
        let policy = Policy::draft("Unpublished", None, None);
        store.insert_policy(&policy).unwrap();
        let user = Uuid::new_v4();
        store
            .insert_assignment(&PolicyAssignment::new(policy.id, AssignmentTarget::User(user), None))
            .unwrap();
        let report = aggregate(&store, &policy.id, now()).unwrap();
        assert_eq!(report, ApprovalReport::default());
    }

    #[test]
    fn missing_policy_is_all_zero() {
        let store = MemoryPolicyStore::new();
        let report = aggregate(&store, &Uuid::new_v4(), now()).unwrap();
        assert_eq!(report.stats.total_assigned, 0);
    }

    #[test]
    fn ten_assigned_six_signed_two_late() {
        let f = Fixture::new();
        let past = now() - Duration::days(3);
        let future = now() + Duration::days(3);
        let users: Vec<Uuid> = (0..10).map(|_| f.user()).collect();
        for (i, user) in users.iter().enumerate() {
            let due = match i {
                8 => Some(future),
                9 => None,
                _ => Some(past),
            };
            f.assign(AssignmentTarget::User(*user), due);
        }
        for user in &users[..6] {
            f.attest(*user, now() - Duration::hours(1));
        }

        let report = f.report();
        assert_eq!(
            report.stats,
            ApprovalStats {
                total_assigned: 10,
                completed: 6,
                pending: 4,
                overdue: 2,
            }
        );
        assert_eq!(report.completion_percentage, 60);
    }

    #[test]
    fn attested_user_is_never_pending_or_overdue() {
        let f = Fixture::new();
        let user = f.user();
        f.assign(AssignmentTarget::User(user), Some(now() - Duration::days(30)));
        f.attest(user, now() - Duration::days(1));

        let stats = f.report().stats;
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.overdue, 0);
    }

    #[test]
    fn direct_and_group_assignment_counted_once() {
        let f = Fixture::new();
        let user = f.user();
        let other = f.user();
        let group = Group::new("Directors", None);
        f.store.insert_group(&group).unwrap();
        for member in [user, other] {
            f.store
                .add_group_member(&GroupMember { group_id: group.id, user_id: member })
                .unwrap();
        }
        f.assign(AssignmentTarget::User(user), None);
        f.assign(AssignmentTarget::Group(group.id), Some(now() - Duration::days(1)));

        let stats = f.report().stats;
        assert_eq!(stats.total_assigned, 2);
        // the direct assignment came first and has no due date
        assert_eq!(stats.overdue, 1);
    }

    #[test]
    fn no_due_date_is_never_overdue() {
        let f = Fixture::new();
        for _ in 0..3 {
            f.assign(AssignmentTarget::User(f.user()), None);
        }
        let stats = f.report().stats;
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.overdue, 0);
    }

    #[test]
    fn due_exactly_now_is_not_overdue() {
        let f = Fixture::new();
        f.assign(AssignmentTarget::User(f.user()), Some(now()));
        assert_eq!(f.report().stats.overdue, 0);
    }

    #[test]
    fn attestation_outside_assignment_does_not_count() {
        let f = Fixture::new();
        let assigned = f.user();
        let volunteer = f.user();
        f.assign(AssignmentTarget::User(assigned), None);
        f.attest(volunteer, now());

        let report = f.report();
        assert_eq!(report.stats.completed, 0);
        assert_eq!(report.stats.pending, 1);
        assert_eq!(report.recent_attestations.len(), 1);
    }

    #[test]
    fn old_version_attestations_ignored() {
        let f = Fixture::new();
        let user = f.user();
        f.assign(AssignmentTarget::User(user), None);
        f.attest(user, now());

        let v2 = PolicyVersion {
            id: Uuid::new_v4(),
            version_number: 2,
            ..f.version.clone()
        };
        f.store.insert_version(&v2).unwrap();
        f.store.set_current_version(&f.policy.id, &v2.id).unwrap();

        let stats = f.report().stats;
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.pending, 1);
    }

    #[test]
    fn recent_attestations_capped_and_ordered() {
        let f = Fixture::new();
        for i in 0..12 {
            let user = f.user();
            f.assign(AssignmentTarget::User(user), None);
            f.attest(user, now() - Duration::minutes(i));
        }
        let report = f.report();
        assert_eq!(report.recent_attestations.len(), RECENT_ATTESTATION_LIMIT);
        let times: Vec<_> = report
            .recent_attestations
            .iter()
            .map(|r| r.attestation.signed_at)
            .collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(report.completion_percentage, 100);
    }

    #[test]
    fn stats_invariants_hold_for_mixed_population() {
        let f = Fixture::new();
        for i in 0..20 {
            let user = f.user();
            let due = match i % 3 {
                0 => None,
                1 => Some(now() - Duration::days(1)),
                _ => Some(now() + Duration::days(1)),
            };
            f.assign(AssignmentTarget::User(user), due);
            if i % 4 == 0 {
                f.attest(user, now());
            }
        }
        let stats = f.report().stats;
        assert_eq!(stats.completed + stats.pending, stats.total_assigned);
        assert!(stats.overdue <= stats.pending);
    }

    #[test]
    fn percentage_rounds_half_up() {
        let stats = ApprovalStats {
            total_assigned: 3,
            completed: 2,
            pending: 1,
            overdue: 0,
        };
        assert_eq!(stats.completion_percentage(), 67);
        let stats = ApprovalStats {
            total_assigned: 8,
            completed: 1,
            pending: 7,
            overdue: 0,
        };
        assert_eq!(stats.completion_percentage(), 13);
    }

    struct FailingStore(MemoryPolicyStore);

    impl FailingStore {
        fn broken() -> DatabaseError {
            DatabaseError::ConstraintViolation("connection reset".into())
        }
    }

    macro_rules! delegate {
        ($($name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
            $(fn $name(&self $(, $arg: $ty)*) -> $ret { self.0.$name($($arg),*) })*
        };
    }

    impl PolicyStore for FailingStore {
        fn list_assignments(&self, _policy_id: &Uuid) -> Result<Vec<PolicyAssignment>, DatabaseError> {
            Err(Self::broken())
        }

        delegate! {
            insert_policy(&self, policy: &Policy) -> Result<(), DatabaseError>;
            get_policy(&self, id: &Uuid) -> Result<Option<Policy>, DatabaseError>;
            list_policies(&self) -> Result<Vec<Policy>, DatabaseError>;
            count_policies(&self) -> Result<i64, DatabaseError>;
            update_policy(&self, id: &Uuid, update: &PolicyUpdate) -> Result<(), DatabaseError>;
            set_current_version(&self, policy_id: &Uuid, version_id: &Uuid) -> Result<(), DatabaseError>;
            delete_policy(&self, id: &Uuid) -> Result<(), DatabaseError>;
            insert_version(&self, version: &PolicyVersion) -> Result<(), DatabaseError>;
            get_version(&self, id: &Uuid) -> Result<Option<PolicyVersion>, DatabaseError>;
            list_versions(&self, policy_id: &Uuid) -> Result<Vec<PolicyVersion>, DatabaseError>;
            next_version_number(&self, policy_id: &Uuid) -> Result<i64, DatabaseError>;
            update_version_file(&self, id: &Uuid, file_name: &str, file_size: i64, file_url: &str) -> Result<(), DatabaseError>;
            insert_assignment(&self, assignment: &PolicyAssignment) -> Result<(), DatabaseError>;
            insert_attestation(&self, attestation: &Attestation) -> Result<(), DatabaseError>;
            list_attestations(&self, version_id: &Uuid) -> Result<Vec<AttestationRecord>, DatabaseError>;
            insert_group(&self, group: &Group) -> Result<(), DatabaseError>;
            find_group_by_name(&self, name: &str) -> Result<Option<Group>, DatabaseError>;
            add_group_member(&self, member: &GroupMember) -> Result<(), DatabaseError>;
            list_group_members(&self, group_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError>;
            delete_groups_named(&self, names: &[&str]) -> Result<usize, DatabaseError>;
            upsert_profile(&self, profile: &Profile) -> Result<(), DatabaseError>;
            get_profile(&self, id: &Uuid) -> Result<Option<Profile>, DatabaseError>;
            list_profiles(&self) -> Result<Vec<Profile>, DatabaseError>;
            count_profiles(&self) -> Result<i64, DatabaseError>;
            purge_users_except(&self, keep: &Uuid) -> Result<Vec<Uuid>, DatabaseError>;
            purge_users(&self, user_ids: &[Uuid]) -> Result<usize, DatabaseError>;
            save_brief(&self, brief: &Brief) -> Result<(), DatabaseError>;
            load_brief(&self, owner_id: &Uuid) -> Result<Option<Brief>, DatabaseError>;
        }
    }

    #[test]
    fn fetch_failure_names_step_and_defaults_to_zero() {
        let f = Fixture::new();
        let user = f.user();
        f.assign(AssignmentTarget::User(user), None);
        f.attest(user, now());
        let failing = FailingStore(f.store);

        let err = aggregate(&failing, &f.policy.id, now()).unwrap_err();
        assert!(err.to_string().contains("assignments"));

        let report = aggregate_or_default(&failing, &f.policy.id, now());
        assert_eq!(report, ApprovalReport::default());
    }
}
