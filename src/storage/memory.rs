use std::collections::HashMap;
use std::sync::Mutex;

use super::{validate_key, ObjectStore, StorageError, StoredObject};

/// In-process object store. Uploads can be made to fail on demand so
/// callers' partial-failure paths can be exercised.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), (Vec<u8>, String)>>,
    fail_puts: std::sync::atomic::AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail with an I/O error.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Keys currently stored in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let Ok(objects) = self.objects.lock() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        let objects = self.objects.lock().ok()?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(_, ct)| ct.clone())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        upsert: bool,
    ) -> Result<StoredObject, StorageError> {
        validate_key(key)?;
        if self.fail_puts.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "upload rejected",
            )));
        }
        let mut objects = self.objects.lock().map_err(|_| StorageError::LockPoisoned)?;
        let id = (bucket.to_string(), key.to_string());
        if !upsert && objects.contains_key(&id) {
            return Err(StorageError::AlreadyExists {
                bucket: bucket.into(),
                key: key.into(),
            });
        }
        objects.insert(id, (bytes.to_vec(), content_type.to_string()));
        Ok(StoredObject {
            bucket: bucket.into(),
            key: key.into(),
            size: bytes.len() as u64,
            content_type: content_type.into(),
            public_url: self.public_url(bucket, key),
        })
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self.objects.lock().map_err(|_| StorageError::LockPoisoned)?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.into(),
                key: key.into(),
            })
    }

    fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let mut objects = self.objects.lock().map_err(|_| StorageError::LockPoisoned)?;
        objects
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.into(),
                key: key.into(),
            })
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{bucket}/{key}")
    }
}
