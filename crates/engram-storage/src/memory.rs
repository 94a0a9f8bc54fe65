//! Process-local storage backend.
//!
//! Holds objects in a `HashMap` behind a Tokio `RwLock`. Used for ephemeral
//! runs and as the reference backend in tests; contents vanish with the
//! process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{BackendError, StorageBackend, validate_object_name};

/// [`StorageBackend`] backed by an in-process map.
pub struct InMemoryBackend {
    name: String,
    priority: u32,
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn store(&self, name: &str, bytes: &[u8]) -> Result<(), BackendError> {
        validate_object_name(name)?;
        self.objects
            .write()
            .await
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn retrieve(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        validate_object_name(name)?;
        self.objects
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                backend: self.name.clone(),
                name: name.to_string(),
            })
    }

    async fn delete(&self, name: &str) -> Result<(), BackendError> {
        validate_object_name(name)?;
        self.objects.write().await.remove(name);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, BackendError> {
        validate_object_name(name)?;
        Ok(self.objects.read().await.contains_key(name))
    }

    async fn list(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.objects.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_retrieve_delete_cycle() {
        let backend = InMemoryBackend::new("mem", 0);
        backend.store("a.json", b"payload").await.unwrap();
        assert!(backend.exists("a.json").await.unwrap());
        assert_eq!(backend.retrieve("a.json").await.unwrap(), b"payload");
        assert_eq!(backend.list().await.unwrap(), vec!["a.json".to_string()]);

        backend.delete("a.json").await.unwrap();
        assert!(!backend.exists("a.json").await.unwrap());
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let backend = InMemoryBackend::new("mem", 0);
        let err = backend.retrieve("nope.json").await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn store_overwrites_existing_object() {
        let backend = InMemoryBackend::new("mem", 0);
        backend.store("a.json", b"v1").await.unwrap();
        backend.store("a.json", b"v2").await.unwrap();
        assert_eq!(backend.len().await, 1);
        assert_eq!(backend.retrieve("a.json").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn delete_of_absent_object_is_ok() {
        let backend = InMemoryBackend::new("mem", 0);
        assert!(backend.delete("ghost.json").await.is_ok());
    }
}
