//! Shared types for the HTTP API layer.

use std::sync::Arc;

use base64::Engine;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::identity::Claims;

/// Largest decoded upload accepted in a JSON body (20 MB).
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

// ═══════════════════════════════════════════════════════════
// Caller context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated caller, injected into request extensions by the auth
/// middleware after the bearer token has been verified.
#[derive(Debug, Clone)]
pub struct Caller(pub Claims);

impl Caller {
    pub fn claims(&self) -> &Claims {
        &self.0
    }

    /// Reject callers that may not edit or publish policies.
    pub fn require_publisher(&self) -> Result<(), ApiError> {
        if self.0.role.can_publish() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Only administrators and publishers can do this".into(),
            ))
        }
    }
}

/// Run CPU-heavy work (PDF rendering, password hashing) off the async
/// worker threads.
pub async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}

// ═══════════════════════════════════════════════════════════
// Upload decoding
// ═══════════════════════════════════════════════════════════

/// Decode a base64 file body, tolerating a `data:...;base64,` prefix.
pub fn decode_upload(data: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match data.find(";base64,") {
        Some(pos) if data.starts_with("data:") => &data[pos + ";base64,".len()..],
        _ => data,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 file data: {e}")))?;
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::BadRequest(format!(
            "File exceeds the {} MB upload limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(bytes)
}

pub fn encode_download(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use uuid::Uuid;

    #[test]
    fn decode_plain_and_data_url() {
        assert_eq!(decode_upload("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_upload("data:application/octet-stream;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode_upload("***"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn encode_round_trips() {
        assert_eq!(decode_upload(&encode_download(b"\x00\x01docx")).unwrap(), b"\x00\x01docx");
    }

    #[test]
    fn employee_is_not_publisher() {
        let caller = Caller(Claims {
            sub: Uuid::new_v4(),
            email: "e@example.com".into(),
            role: Role::Employee,
        });
        assert!(matches!(caller.require_publisher(), Err(ApiError::Forbidden(_))));
    }
}
