//! Object storage seam for uploaded and generated policy documents.

mod local;
mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Bucket holding every policy document, original or formatted.
pub const POLICY_BUCKET: &str = "policy-documents";

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Object already exists: {bucket}/{key}")]
    AlreadyExists { bucket: String, key: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub public_url: String,
}

/// Blob storage keyed by (bucket, key).
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`. Without `upsert`, an existing object is
    /// an `AlreadyExists` error.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        upsert: bool,
    ) -> Result<StoredObject, StorageError>;

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Key for a rendered export: `formatted/{unix_millis}_{file_name}`.
pub fn formatted_key(unix_millis: i64, file_name: &str) -> String {
    format!("formatted/{unix_millis}_{file_name}")
}

/// Key for a document filed under its policy: `{policy_id}/{file_name}`.
pub fn policy_key(policy_id: &Uuid, file_name: &str) -> String {
    format!("{policy_id}/{file_name}")
}

/// Reject keys that are empty, absolute, or climb out of the bucket.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.into()));
    }
    Ok(())
}
