//! Administrative utilities: bulk users, environment cleanup, demo data
//! population and sample-document upload.
//!
//! Every entry point is gated by [`authorize`]: a missing or unknown
//! bearer token is `Unauthorized`, a valid caller with the wrong role is
//! `Forbidden`. The two are never merged.

pub mod populate;
pub mod samples;
pub mod users;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::identity::{bearer_token, Claims, IdentityError, IdentityProvider};
use crate::models::Role;
use crate::storage::StorageError;

pub use populate::{populate_test_data, PopulationOutcome, PopulationPlan};
pub use samples::{upload_sample_policies, SampleUploadOutcome};
pub use users::{add_users_to_group, cleanup_users, AddUsersOutcome, AddUsersRequest, CleanupOutcome};

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const PUBLISHERS: &[Role] = &[Role::Admin, Role::Publisher];

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {required} role required")]
    Forbidden { required: &'static str },

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Identity(IdentityError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<IdentityError> for AdminError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Database(e) => AdminError::Database(e),
            other => AdminError::Identity(other),
        }
    }
}

fn required_label(allowed: &[Role]) -> &'static str {
    if allowed == PUBLISHERS {
        "admin or publisher"
    } else {
        "admin"
    }
}

/// Reject callers whose role is not in `allowed`.
pub fn require_role(caller: &Claims, allowed: &[Role]) -> Result<(), AdminError> {
    if allowed.contains(&caller.role) {
        return Ok(());
    }
    tracing::warn!(user_id = %caller.sub, role = %caller.role, "Forbidden administrative call");
    Err(AdminError::Forbidden {
        required: required_label(allowed),
    })
}

/// Resolve the `Authorization` header to claims and check the role.
pub fn authorize(
    identity: &dyn IdentityProvider,
    authorization: Option<&str>,
    allowed: &[Role],
) -> Result<Claims, AdminError> {
    let token = bearer_token(authorization).ok_or(AdminError::Unauthorized)?;
    let claims = match identity.verify(token) {
        Ok(claims) => claims,
        Err(IdentityError::InvalidToken) => return Err(AdminError::Unauthorized),
        Err(e) => return Err(e.into()),
    };
    require_role(&claims, allowed)?;
    tracing::info!(user_id = %claims.sub, role = %claims.role, "Authorized administrative call");
    Ok(claims)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core_state::CoreState;
    use crate::identity::Claims;
    use crate::models::{Profile, Role};

    /// Register a user with a profile and return a bearer token for them.
    pub fn signed_in(state: &CoreState, email: &str, role: Role) -> (Claims, String) {
        let user = state.identity.create_user(email, "secret-pass").unwrap();
        state
            .store
            .upsert_profile(&Profile {
                id: user.id,
                email: user.email.clone(),
                full_name: email.into(),
                department: None,
                role,
            })
            .unwrap();
        let session = state.identity.login(email, "secret-pass").unwrap();
        let claims = state.identity.verify(&session.access_token).unwrap();
        (claims, session.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::signed_in;
    use super::*;
    use crate::core_state::test_support::state;

    #[test]
    fn missing_header_is_unauthorized() {
        let state = state();
        let err = authorize(state.identity.as_ref(), None, ADMIN_ONLY).unwrap_err();
        assert!(matches!(err, AdminError::Unauthorized));
    }

    #[test]
    fn unknown_token_is_unauthorized() {
        let state = state();
        let err = authorize(state.identity.as_ref(), Some("Bearer nope"), ADMIN_ONLY).unwrap_err();
        assert!(matches!(err, AdminError::Unauthorized));
    }

    #[test]
    fn wrong_role_is_forbidden() {
        let state = state();
        let (_, token) = signed_in(&state, "pub@example.com", Role::Publisher);
        let header = format!("Bearer {token}");
        let err = authorize(state.identity.as_ref(), Some(&header), ADMIN_ONLY).unwrap_err();
        assert!(matches!(err, AdminError::Forbidden { required: "admin" }));
        assert_eq!(err.to_string(), "Forbidden: admin role required");

        let claims = authorize(state.identity.as_ref(), Some(&header), PUBLISHERS).unwrap();
        assert_eq!(claims.role, Role::Publisher);
    }

    #[test]
    fn employee_forbidden_from_publisher_tools() {
        let state = state();
        let (claims, _) = signed_in(&state, "emp@example.com", Role::Employee);
        let err = require_role(&claims, PUBLISHERS).unwrap_err();
        assert!(matches!(err, AdminError::Forbidden { required: "admin or publisher" }));
    }
}
