use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_opt_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const VERSION_COLUMNS: &str = "id, policy_id, version_number, file_name, file_size, file_url,
     change_summary, published_at, created_at";

struct VersionRow {
    id: String,
    policy_id: String,
    version_number: i64,
    file_name: String,
    file_size: i64,
    file_url: String,
    change_summary: Option<String>,
    published_at: Option<String>,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRow> {
    Ok(VersionRow {
        id: row.get(0)?,
        policy_id: row.get(1)?,
        version_number: row.get(2)?,
        file_name: row.get(3)?,
        file_size: row.get(4)?,
        file_url: row.get(5)?,
        change_summary: row.get(6)?,
        published_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn version_from_row(row: VersionRow) -> Result<PolicyVersion, DatabaseError> {
    Ok(PolicyVersion {
        id: parse_uuid("policy_versions.id", &row.id)?,
        policy_id: parse_uuid("policy_versions.policy_id", &row.policy_id)?,
        version_number: row.version_number,
        file_name: row.file_name,
        file_size: row.file_size,
        file_url: row.file_url,
        change_summary: row.change_summary,
        published_at: parse_opt_timestamp("policy_versions.published_at", row.published_at)?,
        created_at: parse_timestamp("policy_versions.created_at", &row.created_at)?,
    })
}

pub fn insert_version(conn: &Connection, version: &PolicyVersion) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO policy_versions (id, policy_id, version_number, file_name, file_size,
         file_url, change_summary, published_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            version.id.to_string(),
            version.policy_id.to_string(),
            version.version_number,
            version.file_name,
            version.file_size,
            version.file_url,
            version.change_summary,
            version.published_at.as_ref().map(format_timestamp),
            format_timestamp(&version.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_version(conn: &Connection, id: &Uuid) -> Result<Option<PolicyVersion>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS} FROM policy_versions WHERE id = ?1"
    ))?;
    match stmt.query_row(params![id.to_string()], read_row) {
        Ok(row) => Ok(Some(version_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Versions of a policy, highest version number first.
pub fn list_versions_for_policy(
    conn: &Connection,
    policy_id: &Uuid,
) -> Result<Vec<PolicyVersion>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS} FROM policy_versions
         WHERE policy_id = ?1 ORDER BY version_number DESC"
    ))?;
    let rows = stmt.query_map(params![policy_id.to_string()], read_row)?;

    let mut versions = Vec::new();
    for row in rows {
        versions.push(version_from_row(row?)?);
    }
    Ok(versions)
}

/// The next unused version number for a policy (1 for the first version).
pub fn next_version_number(conn: &Connection, policy_id: &Uuid) -> Result<i64, DatabaseError> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(version_number) FROM policy_versions WHERE policy_id = ?1",
        params![policy_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

/// Point an existing version at a freshly uploaded file.
pub fn update_version_file(
    conn: &Connection,
    id: &Uuid,
    file_name: &str,
    file_size: i64,
    file_url: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE policy_versions SET file_name = ?2, file_size = ?3, file_url = ?4 WHERE id = ?1",
        params![id.to_string(), file_name, file_size, file_url],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "PolicyVersion".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
