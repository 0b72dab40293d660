use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_uuid, placeholders};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_group(conn: &Connection, group: &Group) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO groups (id, name, description) VALUES (?1, ?2, ?3)",
        params![group.id.to_string(), group.name, group.description],
    )?;
    Ok(())
}

/// Case-insensitive lookup by name; the first match wins.
pub fn find_group_by_name(conn: &Connection, name: &str) -> Result<Option<Group>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, description FROM groups WHERE name = ?1 COLLATE NOCASE
         ORDER BY rowid LIMIT 1",
        params![name],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        },
    );
    match result {
        Ok((id, name, description)) => Ok(Some(Group {
            id: parse_uuid("groups.id", &id)?,
            name,
            description,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn add_group_member(conn: &Connection, member: &GroupMember) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?1, ?2)",
        params![member.group_id.to_string(), member.user_id.to_string()],
    )?;
    Ok(())
}

/// Current member user ids of a group.
pub fn list_group_members(conn: &Connection, group_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY rowid ASC",
    )?;
    let ids = stmt
        .query_map(params![group_id.to_string()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.iter()
        .map(|id| parse_uuid("group_members.user_id", id))
        .collect()
}

pub fn delete_group_members_except(conn: &Connection, keep: &Uuid) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM group_members WHERE user_id <> ?1",
        params![keep.to_string()],
    )?)
}

pub fn delete_group_members_for_users(conn: &Connection, user_ids: &[Uuid]) -> Result<usize, DatabaseError> {
    if user_ids.is_empty() {
        return Ok(0);
    }
    Ok(conn.execute(
        &format!(
            "DELETE FROM group_members WHERE user_id IN ({})",
            placeholders(user_ids.len())
        ),
        rusqlite::params_from_iter(user_ids.iter().map(|id| id.to_string())),
    )?)
}

/// Delete groups by exact name, along with their memberships and any
/// assignments that target them.
pub fn delete_groups_named(conn: &Connection, names: &[&str]) -> Result<usize, DatabaseError> {
    if names.is_empty() {
        return Ok(0);
    }
    let list = placeholders(names.len());
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        &format!(
            "DELETE FROM group_members WHERE group_id IN (SELECT id FROM groups WHERE name IN ({list}))"
        ),
        rusqlite::params_from_iter(names.iter()),
    )?;
    tx.execute(
        &format!(
            "DELETE FROM policy_assignments WHERE group_id IN (SELECT id FROM groups WHERE name IN ({list}))"
        ),
        rusqlite::params_from_iter(names.iter()),
    )?;
    let rows = tx.execute(
        &format!("DELETE FROM groups WHERE name IN ({list})"),
        rusqlite::params_from_iter(names.iter()),
    )?;
    tx.commit()?;
    Ok(rows)
}
