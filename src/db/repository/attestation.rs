use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid, placeholders};
use crate::db::DatabaseError;
use crate::models::*;

/// Record a sign-off. A second attestation for the same (user, version)
/// pair violates the unique constraint.
pub fn insert_attestation(conn: &Connection, attestation: &Attestation) -> Result<(), DatabaseError> {
    let result = conn.execute(
        "INSERT INTO attestations (id, user_id, policy_version_id, signed_at, assessment_passed)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            attestation.id.to_string(),
            attestation.user_id.to_string(),
            attestation.policy_version_id.to_string(),
            format_timestamp(&attestation.signed_at),
            attestation.assessment_passed,
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(DatabaseError::ConstraintViolation(format!(
                "user {} already attested to version {}",
                attestation.user_id, attestation.policy_version_id
            )))
        }
        Err(e) => Err(e.into()),
    }
}

/// Attestations for a version joined with the signer's profile,
/// most recent first.
pub fn list_attestations_for_version(
    conn: &Connection,
    version_id: &Uuid,
) -> Result<Vec<AttestationRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.user_id, a.policy_version_id, a.signed_at, a.assessment_passed,
                p.full_name, p.email
         FROM attestations a
         LEFT JOIN profiles p ON p.id = a.user_id
         WHERE a.policy_version_id = ?1
         ORDER BY a.signed_at DESC",
    )?;
    let rows = stmt.query_map(params![version_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<bool>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, user_id, version_id, signed_at, passed, full_name, email) = row?;
        records.push(AttestationRecord {
            attestation: Attestation {
                id: parse_uuid("attestations.id", &id)?,
                user_id: parse_uuid("attestations.user_id", &user_id)?,
                policy_version_id: parse_uuid("attestations.policy_version_id", &version_id)?,
                signed_at: parse_timestamp("attestations.signed_at", &signed_at)?,
                assessment_passed: passed,
            },
            full_name,
            email,
        });
    }
    Ok(records)
}

pub fn delete_attestations_except(conn: &Connection, keep: &Uuid) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM attestations WHERE user_id <> ?1",
        params![keep.to_string()],
    )?)
}

pub fn delete_attestations_for_users(conn: &Connection, user_ids: &[Uuid]) -> Result<usize, DatabaseError> {
    if user_ids.is_empty() {
        return Ok(0);
    }
    Ok(conn.execute(
        &format!(
            "DELETE FROM attestations WHERE user_id IN ({})",
            placeholders(user_ids.len())
        ),
        rusqlite::params_from_iter(user_ids.iter().map(|id| id.to_string())),
    )?)
}
