use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Brief;

/// Save the owner's draft, replacing any previous one.
pub fn upsert_brief(conn: &Connection, brief: &Brief) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO briefs (id, owner_id, title, content_html, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(owner_id) DO UPDATE SET
            title = excluded.title,
            content_html = excluded.content_html,
            updated_at = excluded.updated_at",
        params![
            brief.id.to_string(),
            brief.owner_id.to_string(),
            brief.title,
            brief.content_html,
            format_timestamp(&brief.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_brief_for_owner(conn: &Connection, owner_id: &Uuid) -> Result<Option<Brief>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, owner_id, title, content_html, updated_at FROM briefs WHERE owner_id = ?1",
        params![owner_id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    );
    match result {
        Ok((id, owner_id, title, content_html, updated_at)) => Ok(Some(Brief {
            id: parse_uuid("briefs.id", &id)?,
            owner_id: parse_uuid("briefs.owner_id", &owner_id)?,
            title,
            content_html,
            updated_at: parse_timestamp("briefs.updated_at", &updated_at)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
