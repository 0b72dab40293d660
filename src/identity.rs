//! Local identity provider: password accounts and bearer sessions.
//!
//! Passwords are stored as PBKDF2-SHA256 digests with a per-user salt.
//! Bearer tokens are random URL-safe strings; only their SHA-256 hash is
//! persisted, so a leaked database does not leak live sessions.

use chrono::{DateTime, Duration, Utc};
use pbkdf2::pbkdf2_hmac;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroize;

use crate::db::repository::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Role;
use crate::store::SharedConnection;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

/// Lifetime of a bearer session.
pub const SESSION_TTL_HOURS: i64 = 12;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("A user with this email address has already been registered")]
    AlreadyRegistered,

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for IdentityError {
    fn from(err: rusqlite::Error) -> Self {
        IdentityError::Database(err.into())
    }
}

/// What a bearer token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub access_token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

pub trait IdentityProvider: Send + Sync {
    /// Register an account. Emails are unique, compared case-insensitively.
    fn create_user(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError>;

    fn login(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Resolve a bearer token to claims. The role comes from the user's
    /// profile, defaulting to `employee` when no profile exists yet.
    fn verify(&self, token: &str) -> Result<Claims, IdentityError>;

    fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, IdentityError>;

    fn list_users(&self) -> Result<Vec<AuthUser>, IdentityError>;

    /// Delete an account and every session it holds.
    fn delete_user(&self, id: &Uuid) -> Result<(), IdentityError>;
}

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Token carried by an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

fn derive_password_hash(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// SQLite-backed identity provider sharing the portal's connection.
pub struct SqliteIdentity {
    conn: SharedConnection,
    iterations: u32,
}

impl SqliteIdentity {
    pub fn new(conn: SharedConnection) -> Self {
        Self::with_iterations(conn, PBKDF2_ITERATIONS)
    }

    /// Lower iteration counts keep bulk seeding and tests fast.
    pub fn with_iterations(conn: SharedConnection, iterations: u32) -> Self {
        Self { conn, iterations }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, IdentityError>,
    ) -> Result<T, IdentityError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

fn user_by_email(conn: &Connection, email: &str) -> Result<Option<(AuthUser, Vec<u8>, Vec<u8>)>, IdentityError> {
    let result = conn.query_row(
        "SELECT id, email, created_at, password_salt, password_hash
         FROM auth_users WHERE email = ?1 COLLATE NOCASE",
        params![email],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
                row.get::<_, Vec<u8>>(4)?,
            ))
        },
    );
    match result {
        Ok((id, email, created_at, salt, hash)) => Ok(Some((
            AuthUser {
                id: parse_uuid("auth_users.id", &id)?,
                email,
                created_at: parse_timestamp("auth_users.created_at", &created_at)?,
            },
            salt,
            hash,
        ))),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl IdentityProvider for SqliteIdentity {
    fn create_user(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        let email = email.trim();
        let salt = generate_salt();
        let mut hash = derive_password_hash(password, &salt, self.iterations);

        let result = self.with_conn(|conn| {
            if user_by_email(conn, email)?.is_some() {
                return Err(IdentityError::AlreadyRegistered);
            }
            let user = AuthUser {
                id: Uuid::new_v4(),
                email: email.to_string(),
                created_at: Utc::now(),
            };
            conn.execute(
                "INSERT INTO auth_users (id, email, password_salt, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.email,
                    salt.as_slice(),
                    hash.as_slice(),
                    format_timestamp(&user.created_at),
                ],
            )?;
            Ok(user)
        });
        hash.zeroize();
        result
    }

    fn login(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        self.with_conn(|conn| {
            let Some((user, salt, stored)) = user_by_email(conn, email.trim())? else {
                return Err(IdentityError::InvalidCredentials);
            };
            let mut candidate = derive_password_hash(password, &salt, self.iterations);
            let matches: bool = candidate.as_slice().ct_eq(stored.as_slice()).into();
            candidate.zeroize();
            if !matches {
                tracing::warn!(user_id = %user.id, "Failed login attempt");
                return Err(IdentityError::InvalidCredentials);
            }

            let token = generate_token();
            let expires_at = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
            conn.execute(
                "INSERT INTO auth_sessions (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![
                    hash_token(&token).as_slice(),
                    user.id.to_string(),
                    format_timestamp(&expires_at),
                ],
            )?;
            tracing::info!(user_id = %user.id, "Session issued");
            Ok(Session {
                access_token: token,
                user_id: user.id,
                expires_at,
            })
        })
    }

    fn verify(&self, token: &str) -> Result<Claims, IdentityError> {
        let token_hash = hash_token(token);
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT u.id, u.email, s.expires_at, p.role
                 FROM auth_sessions s
                 JOIN auth_users u ON u.id = s.user_id
                 LEFT JOIN profiles p ON p.id = u.id
                 WHERE s.token_hash = ?1",
                params![token_hash.as_slice()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            );
            let (id, email, expires_at, role) = match result {
                Ok(row) => row,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Err(IdentityError::InvalidToken),
                Err(e) => return Err(e.into()),
            };
            if parse_timestamp("auth_sessions.expires_at", &expires_at)? <= Utc::now() {
                conn.execute(
                    "DELETE FROM auth_sessions WHERE token_hash = ?1",
                    params![token_hash.as_slice()],
                )?;
                return Err(IdentityError::InvalidToken);
            }
            let role = match role {
                Some(r) => r.parse::<Role>()?,
                None => Role::Employee,
            };
            Ok(Claims {
                sub: parse_uuid("auth_users.id", &id)?,
                email,
                role,
            })
        })
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, IdentityError> {
        self.with_conn(|conn| Ok(user_by_email(conn, email.trim())?.map(|(user, _, _)| user)))
    }

    fn list_users(&self) -> Result<Vec<AuthUser>, IdentityError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, email, created_at FROM auth_users ORDER BY created_at ASC")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            let mut users = Vec::with_capacity(rows.len());
            for (id, email, created_at) in rows {
                users.push(AuthUser {
                    id: parse_uuid("auth_users.id", &id)?,
                    email,
                    created_at: parse_timestamp("auth_users.created_at", &created_at)?,
                });
            }
            Ok(users)
        })
    }

    fn delete_user(&self, id: &Uuid) -> Result<(), IdentityError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM auth_sessions WHERE user_id = ?1",
                params![id.to_string()],
            )?;
            let rows = conn.execute("DELETE FROM auth_users WHERE id = ?1", params![id.to_string()])?;
            if rows == 0 {
                return Err(IdentityError::UserNotFound(*id));
            }
            Ok(())
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::identity;
    use super::*;
    use crate::db::repository::insert_profile;
    use crate::models::Profile;

    #[test]
    fn generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn bearer_token_requires_scheme() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer   ")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn hash_token_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[test]
    fn login_then_verify_yields_claims() {
        let (idp, _) = identity();
        let user = idp.create_user("ada@example.com", "Password123!").unwrap();
        let session = idp.login("ADA@example.com", "Password123!").unwrap();
        let claims = idp.verify(&session.access_token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Employee);
    }

    #[test]
    fn role_comes_from_profile() {
        let (idp, conn) = identity();
        let user = idp.create_user("root@example.com", "pw").unwrap();
        insert_profile(
            &conn.lock().unwrap(),
            &Profile {
                id: user.id,
                email: user.email.clone(),
                full_name: "Root".into(),
                department: None,
                role: Role::Admin,
            },
        )
        .unwrap();
        let session = idp.login("root@example.com", "pw").unwrap();
        assert_eq!(idp.verify(&session.access_token).unwrap().role, Role::Admin);
    }

    #[test]
    fn wrong_password_rejected() {
        let (idp, _) = identity();
        idp.create_user("ada@example.com", "right").unwrap();
        assert!(matches!(
            idp.login("ada@example.com", "wrong"),
            Err(IdentityError::InvalidCredentials)
        ));
        assert!(matches!(
            idp.login("nobody@example.com", "right"),
            Err(IdentityError::InvalidCredentials)
        ));
    }

    #[test]
    fn duplicate_email_already_registered() {
        let (idp, _) = identity();
        idp.create_user("ada@example.com", "pw").unwrap();
        assert!(matches!(
            idp.create_user("Ada@Example.com", "pw"),
            Err(IdentityError::AlreadyRegistered)
        ));
    }

    #[test]
    fn unknown_token_invalid() {
        let (idp, _) = identity();
        assert!(matches!(idp.verify("garbage"), Err(IdentityError::InvalidToken)));
    }

    #[test]
    fn delete_user_revokes_sessions() {
        let (idp, _) = identity();
        let user = idp.create_user("ada@example.com", "pw").unwrap();
        let session = idp.login("ada@example.com", "pw").unwrap();
        idp.delete_user(&user.id).unwrap();
        assert!(matches!(
            idp.verify(&session.access_token),
            Err(IdentityError::InvalidToken)
        ));
        assert!(idp.list_users().unwrap().is_empty());
    }
}
