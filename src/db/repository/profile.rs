use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_uuid, placeholders};
use crate::db::DatabaseError;
use crate::models::*;

fn profile_from_parts(
    id: String,
    email: String,
    full_name: String,
    department: Option<String>,
    role: String,
) -> Result<Profile, DatabaseError> {
    Ok(Profile {
        id: parse_uuid("profiles.id", &id)?,
        email,
        full_name,
        department,
        role: Role::from_str(&role)?,
    })
}

/// Insert or replace a profile row keyed by id.
pub fn insert_profile(conn: &Connection, profile: &Profile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO profiles (id, email, full_name, department, role)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            full_name = excluded.full_name,
            department = excluded.department,
            role = excluded.role",
        params![
            profile.id.to_string(),
            profile.email,
            profile.full_name,
            profile.department,
            profile.role.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &Uuid) -> Result<Option<Profile>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, email, full_name, department, role FROM profiles WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    );
    match result {
        Ok((id, email, full_name, department, role)) => {
            Ok(Some(profile_from_parts(id, email, full_name, department, role)?))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_profiles(conn: &Connection) -> Result<Vec<Profile>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, email, full_name, department, role FROM profiles ORDER BY email ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut profiles = Vec::new();
    for row in rows {
        let (id, email, full_name, department, role) = row?;
        profiles.push(profile_from_parts(id, email, full_name, department, role)?);
    }
    Ok(profiles)
}

pub fn count_profiles(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?)
}

pub fn delete_profiles(conn: &Connection, ids: &[Uuid]) -> Result<usize, DatabaseError> {
    if ids.is_empty() {
        return Ok(0);
    }
    Ok(conn.execute(
        &format!("DELETE FROM profiles WHERE id IN ({})", placeholders(ids.len())),
        rusqlite::params_from_iter(ids.iter().map(|id| id.to_string())),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn admin() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            email: "admin@example.com".into(),
            full_name: "Site Admin".into(),
            department: Some("Admin".into()),
            role: Role::Admin,
        }
    }

    #[test]
    fn profile_insert_then_upsert() {
        let conn = open_memory_database().unwrap();
        let mut profile = admin();
        insert_profile(&conn, &profile).unwrap();
        profile.role = Role::Publisher;
        insert_profile(&conn, &profile).unwrap();

        let loaded = get_profile(&conn, &profile.id).unwrap().unwrap();
        assert_eq!(loaded.role, Role::Publisher);
        assert_eq!(count_profiles(&conn).unwrap(), 1);
    }

    #[test]
    fn delete_profiles_by_id() {
        let conn = open_memory_database().unwrap();
        let profile = admin();
        insert_profile(&conn, &profile).unwrap();
        assert_eq!(delete_profiles(&conn, &[profile.id]).unwrap(), 1);
        assert!(list_profiles(&conn).unwrap().is_empty());
    }
}
