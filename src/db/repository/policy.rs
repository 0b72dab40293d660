use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_opt_uuid, parse_timestamp, parse_uuid, placeholders};
use crate::db::DatabaseError;
use crate::models::*;

const POLICY_COLUMNS: &str =
    "id, title, description, category, status, current_version_id, created_by, created_at";

struct PolicyRow {
    id: String,
    title: String,
    description: Option<String>,
    category: Option<String>,
    status: String,
    current_version_id: Option<String>,
    created_by: Option<String>,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PolicyRow> {
    Ok(PolicyRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        status: row.get(4)?,
        current_version_id: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn policy_from_row(row: PolicyRow) -> Result<Policy, DatabaseError> {
    Ok(Policy {
        id: parse_uuid("policies.id", &row.id)?,
        title: row.title,
        description: row.description,
        category: row.category,
        status: PolicyStatus::from_str(&row.status)?,
        current_version_id: parse_opt_uuid("policies.current_version_id", row.current_version_id)?,
        created_by: parse_opt_uuid("policies.created_by", row.created_by)?,
        created_at: parse_timestamp("policies.created_at", &row.created_at)?,
    })
}

pub fn insert_policy(conn: &Connection, policy: &Policy) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO policies (id, title, description, category, status, current_version_id,
         created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            policy.id.to_string(),
            policy.title,
            policy.description,
            policy.category,
            policy.status.as_str(),
            policy.current_version_id.map(|id| id.to_string()),
            policy.created_by.map(|id| id.to_string()),
            format_timestamp(&policy.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_policy(conn: &Connection, id: &Uuid) -> Result<Option<Policy>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POLICY_COLUMNS} FROM policies WHERE id = ?1"
    ))?;

    match stmt.query_row(params![id.to_string()], read_row) {
        Ok(row) => Ok(Some(policy_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All policies, newest first.
pub fn count_policies(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM policies", [], |row| row.get(0))?)
}

pub fn list_policies(conn: &Connection) -> Result<Vec<Policy>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POLICY_COLUMNS} FROM policies ORDER BY created_at DESC, title ASC"
    ))?;
    let rows = stmt.query_map([], read_row)?;

    let mut policies = Vec::new();
    for row in rows {
        policies.push(policy_from_row(row?)?);
    }
    Ok(policies)
}

/// Apply a settings update. Returns `NotFound` when the policy is missing.
pub fn update_policy(conn: &Connection, id: &Uuid, update: &PolicyUpdate) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE policies SET
            status = COALESCE(?2, status),
            category = COALESCE(?3, category)
         WHERE id = ?1",
        params![
            id.to_string(),
            update.status.map(|s| s.as_str()),
            update.category,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Policy".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn set_current_version(
    conn: &Connection,
    policy_id: &Uuid,
    version_id: &Uuid,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE policies SET current_version_id = ?2 WHERE id = ?1",
        params![policy_id.to_string(), version_id.to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Policy".into(),
            id: policy_id.to_string(),
        });
    }
    Ok(())
}

/// Delete a policy together with its assignments, the attestations against
/// any of its versions, and the versions themselves, in dependency order.
pub fn delete_policy_cascade(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    delete_policy_rows(&tx, id)?;
    tx.commit()?;
    Ok(())
}

/// Cascade body without its own transaction, for callers already inside one.
fn delete_policy_rows(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let id = id.to_string();

    conn.execute("DELETE FROM policy_assignments WHERE policy_id = ?1", params![id])?;
    conn.execute(
        "DELETE FROM attestations WHERE policy_version_id IN
            (SELECT id FROM policy_versions WHERE policy_id = ?1)",
        params![id],
    )?;
    conn.execute(
        "UPDATE policies SET current_version_id = NULL WHERE id = ?1",
        params![id],
    )?;
    conn.execute("DELETE FROM policy_versions WHERE policy_id = ?1", params![id])?;
    let rows = conn.execute("DELETE FROM policies WHERE id = ?1", params![id])?;

    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Policy".into(),
            id,
        });
    }
    Ok(())
}

/// Delete every policy created by one of the given users (with dependents).
/// Runs inside the caller's transaction, if any.
pub fn delete_policies_created_by(conn: &Connection, user_ids: &[Uuid]) -> Result<usize, DatabaseError> {
    if user_ids.is_empty() {
        return Ok(0);
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM policies WHERE created_by IN ({})",
        placeholders(user_ids.len())
    ))?;
    let ids: Vec<String> = stmt
        .query_map(
            rusqlite::params_from_iter(user_ids.iter().map(|id| id.to_string())),
            |row| row.get(0),
        )?
        .collect::<Result<_, _>>()?;

    for id in &ids {
        delete_policy_rows(conn, &parse_uuid("policies.id", id)?)?;
    }
    Ok(ids.len())
}
