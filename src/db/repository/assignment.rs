use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_opt_timestamp, parse_opt_uuid, parse_uuid, placeholders};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_assignment(conn: &Connection, assignment: &PolicyAssignment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO policy_assignments (id, policy_id, user_id, group_id, due_date, assigned_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            assignment.id.to_string(),
            assignment.policy_id.to_string(),
            assignment.user_id().map(|id| id.to_string()),
            assignment.group_id().map(|id| id.to_string()),
            assignment.due_date.as_ref().map(format_timestamp),
            assignment.assigned_by.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

/// Assignments for a policy in insertion order, so "first occurrence wins"
/// is stable for callers that deduplicate users.
pub fn list_assignments_for_policy(
    conn: &Connection,
    policy_id: &Uuid,
) -> Result<Vec<PolicyAssignment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, policy_id, user_id, group_id, due_date, assigned_by
         FROM policy_assignments WHERE policy_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map(params![policy_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut assignments = Vec::new();
    for row in rows {
        let (id, policy_id, user_id, group_id, due_date, assigned_by) = row?;
        let target = match (
            parse_opt_uuid("policy_assignments.user_id", user_id)?,
            parse_opt_uuid("policy_assignments.group_id", group_id)?,
        ) {
            (Some(user), None) => AssignmentTarget::User(user),
            (None, Some(group)) => AssignmentTarget::Group(group),
            _ => {
                return Err(DatabaseError::ConstraintViolation(format!(
                    "assignment {id} must target exactly one user or group"
                )))
            }
        };
        assignments.push(PolicyAssignment {
            id: parse_uuid("policy_assignments.id", &id)?,
            policy_id: parse_uuid("policy_assignments.policy_id", &policy_id)?,
            target,
            due_date: parse_opt_timestamp("policy_assignments.due_date", due_date)?,
            assigned_by: parse_opt_uuid("policy_assignments.assigned_by", assigned_by)?,
        });
    }
    Ok(assignments)
}

/// Remove direct user assignments for every user except `keep`.
/// Group assignments are left untouched.
pub fn delete_user_assignments_except(conn: &Connection, keep: &Uuid) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM policy_assignments WHERE user_id IS NOT NULL AND user_id <> ?1",
        params![keep.to_string()],
    )?;
    Ok(rows)
}

/// Remove assignments that target, or were made by, any of the given users.
pub fn delete_assignments_for_users(conn: &Connection, user_ids: &[Uuid]) -> Result<usize, DatabaseError> {
    if user_ids.is_empty() {
        return Ok(0);
    }
    let list = placeholders(user_ids.len());
    let rows = conn.execute(
        &format!(
            "DELETE FROM policy_assignments WHERE user_id IN ({list}) OR assigned_by IN ({list})"
        ),
        rusqlite::params_from_iter(user_ids.iter().map(|id| id.to_string())),
    )?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::repository::insert_group;
    use crate::db::sqlite::open_memory_database;
    use chrono::{TimeZone, Utc};

    #[test]
    fn assignments_preserve_target_and_due_date() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::profile(&conn, "Grace Hopper");
        let group = Group::new("Directors", None);
        insert_group(&conn, &group).unwrap();
        let policy = fixtures::policy(&conn, "Conduct");
        let due = Utc.with_ymd_and_hms(2025, 6, 30, 17, 0, 0).unwrap();

        insert_assignment(&conn, &PolicyAssignment::new(policy.id, AssignmentTarget::User(user), Some(due))).unwrap();
        insert_assignment(&conn, &PolicyAssignment::new(policy.id, AssignmentTarget::Group(group.id), None)).unwrap();

        let loaded = list_assignments_for_policy(&conn, &policy.id).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].target, AssignmentTarget::User(user));
        assert_eq!(loaded[0].due_date, Some(due));
        assert_eq!(loaded[1].target, AssignmentTarget::Group(group.id));
        assert_eq!(loaded[1].due_date, None);
    }

    #[test]
    fn delete_except_keeps_protected_user_and_groups() {
        let conn = open_memory_database().unwrap();
        let admin = fixtures::profile(&conn, "Admin One");
        let other = fixtures::profile(&conn, "Other One");
        let group = Group::new("All", None);
        insert_group(&conn, &group).unwrap();
        let policy = fixtures::policy(&conn, "Conduct");
        for target in [
            AssignmentTarget::User(admin),
            AssignmentTarget::User(other),
            AssignmentTarget::Group(group.id),
        ] {
            insert_assignment(&conn, &PolicyAssignment::new(policy.id, target, None)).unwrap();
        }

        assert_eq!(delete_user_assignments_except(&conn, &admin).unwrap(), 1);
        let remaining = list_assignments_for_policy(&conn, &policy.id).unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|a| a.user_id() != Some(other)));
    }
}
