//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::admin::AdminError;
use crate::brief::BriefError;
use crate::core_state::CoreError;
use crate::db::DatabaseError;
use crate::document::PipelineError;
use crate::identity::IdentityError;
use crate::settings::SettingsError;
use crate::storage::StorageError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail.clone()),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail.clone()),
            ApiError::ConversionFailed(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "CONVERSION_FAILED",
                detail.clone(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, .. } => {
                ApiError::NotFound(format!("{entity_type} not found"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => ApiError::NotFound("Object not found".into()),
            StorageError::InvalidKey(key) => ApiError::BadRequest(format!("Invalid object key: {key}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials | IdentityError::InvalidToken => ApiError::Unauthorized,
            IdentityError::AlreadyRegistered => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Forbidden => ApiError::Forbidden(err.to_string()),
            SettingsError::PolicyNotFound(_) => ApiError::NotFound("Policy not found".into()),
            SettingsError::InvalidInput(msg) => ApiError::BadRequest(msg),
            SettingsError::NoCurrentVersion => ApiError::BadRequest(err.to_string()),
            SettingsError::AlreadyAttested => ApiError::Conflict(err.to_string()),
            SettingsError::Database(e) => e.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidInput(msg) => ApiError::BadRequest(msg),
            PipelineError::Parse(ref source) => {
                tracing::warn!(error = %source, "Document conversion failed");
                ApiError::ConversionFailed(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<BriefError> for ApiError {
    fn from(err: BriefError) -> Self {
        match err {
            BriefError::InvalidInput(msg) => ApiError::BadRequest(msg),
            BriefError::Import(_) => ApiError::ConversionFailed(err.to_string()),
            BriefError::Export(ref source) => ApiError::Internal(format!("{err}: {source}")),
            BriefError::Database(e) => e.into(),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Unauthorized => ApiError::Unauthorized,
            AdminError::Forbidden { .. } => ApiError::Forbidden(err.to_string()),
            AdminError::InvalidInput(msg) => ApiError::BadRequest(msg),
            AdminError::Identity(e) => e.into(),
            AdminError::Database(e) => ApiError::Internal(e.to_string()),
            AdminError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(response).await["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn forbidden_is_distinct_from_unauthorized() {
        let response: Response = ApiError::from(AdminError::Forbidden { required: "admin" }).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "FORBIDDEN");
        assert_eq!(json["error"]["message"], "Forbidden: admin role required");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_of(response).await["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn parse_failure_is_422_with_generic_message() {
        let codec_err = crate::document::docx::CodecError::MissingPart("word/document.xml");
        let response = ApiError::from(PipelineError::Parse(codec_err)).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_of(response).await["error"]["message"], "Failed to read the .docx file");
    }

    #[tokio::test]
    async fn persist_failure_is_internal() {
        let err = PipelineError::Persist {
            step: "record the version",
            source: DatabaseError::LockPoisoned,
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_rows_map_to_not_found() {
        let err: ApiError = DatabaseError::NotFound {
            entity_type: "Policy".into(),
            id: "x".into(),
        }
        .into();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Policy not found"));
    }

    #[test]
    fn duplicate_attestation_is_conflict() {
        let err: ApiError = SettingsError::AlreadyAttested.into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
