//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, one sub-module per table
//! family. `SqlitePolicyStore` composes them behind the `PolicyStore` trait.

mod assignment;
mod attestation;
mod brief;
mod group;
mod policy;
mod profile;
mod version;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DatabaseError;

pub use assignment::*;
pub use attestation::*;
pub use brief::*;
pub use group::*;
pub use policy::*;
pub use profile::*;
pub use version::*;

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    })
}

pub(crate) fn parse_opt_uuid(field: &str, value: Option<String>) -> Result<Option<Uuid>, DatabaseError> {
    value.map(|v| parse_uuid(field, &v)).transpose()
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidValue {
            field: field.into(),
            value: value.into(),
        })
}

pub(crate) fn parse_opt_timestamp(
    field: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    value.map(|v| parse_timestamp(field, &v)).transpose()
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// SQL placeholder list `?1, ?2, ...` for `IN (...)` clauses.
pub(crate) fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
