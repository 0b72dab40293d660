use std::path::{Path, PathBuf};

use super::{validate_key, ObjectStore, StorageError, StoredObject};

/// Filesystem object store: `{root}/{bucket}/{key}`.
///
/// Public URLs point at the portal's `/storage/{bucket}/{key}` route,
/// which serves the same files back.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(bucket)?;
        validate_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        upsert: bool,
    ) -> Result<StoredObject, StorageError> {
        let path = self.object_path(bucket, key)?;
        if !upsert && path.exists() {
            return Err(StorageError::AlreadyExists {
                bucket: bucket.into(),
                key: key.into(),
            });
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        tracing::debug!(bucket, key, size = bytes.len(), "Object stored");

        Ok(StoredObject {
            bucket: bucket.into(),
            key: key.into(),
            size: bytes.len() as u64,
            content_type: content_type.into(),
            public_url: self.public_url(bucket, key),
        })
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.into(),
                key: key.into(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.into(),
                key: key.into(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/{bucket}/{key}", self.public_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{formatted_key, PDF_CONTENT_TYPE, POLICY_BUCKET};

    #[test]
    fn put_then_get_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8787/");
        let key = formatted_key(42, "policy.pdf");

        let stored = store
            .put(POLICY_BUCKET, &key, b"%PDF-1.3", PDF_CONTENT_TYPE, false)
            .unwrap();
        assert_eq!(stored.size, 8);
        assert_eq!(
            stored.public_url,
            "http://localhost:8787/storage/policy-documents/formatted/42_policy.pdf"
        );
        assert_eq!(store.get(POLICY_BUCKET, &key).unwrap(), b"%PDF-1.3");
        assert!(dir.path().join("policy-documents/formatted/42_policy.pdf").exists());
    }

    #[test]
    fn put_without_upsert_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://h");
        store.put("b", "k.pdf", b"1", PDF_CONTENT_TYPE, false).unwrap();
        assert!(matches!(
            store.put("b", "k.pdf", b"2", PDF_CONTENT_TYPE, false),
            Err(StorageError::AlreadyExists { .. })
        ));
        store.put("b", "k.pdf", b"2", PDF_CONTENT_TYPE, true).unwrap();
        assert_eq!(store.get("b", "k.pdf").unwrap(), b"2");
    }

    #[test]
    fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://h");
        assert!(matches!(
            store.get("b", "nope.pdf"),
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            store.remove("b", "nope.pdf"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn escaping_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://h");
        assert!(matches!(
            store.put("b", "../escape.pdf", b"x", PDF_CONTENT_TYPE, true),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
