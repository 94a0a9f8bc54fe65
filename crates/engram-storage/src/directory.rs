//! Directory-backed storage.
//!
//! Each object is one file directly under the configured root. Writes go to
//! a `.<name>.partial` sibling first and are renamed into place, so readers
//! never observe a half-written object.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::backend::{BackendError, StorageBackend, validate_object_name};

const PARTIAL_SUFFIX: &str = ".partial";

/// [`StorageBackend`] writing one file per object under `root`.
pub struct DirectoryBackend {
    name: String,
    priority: u32,
    root: PathBuf,
}

impl DirectoryBackend {
    pub fn new(name: impl Into<String>, priority: u32, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            priority,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, BackendError> {
        validate_object_name(name)?;
        Ok(self.root.join(name))
    }

    fn unavailable(&self, e: std::io::Error) -> BackendError {
        BackendError::Unavailable {
            backend: self.name.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl StorageBackend for DirectoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn is_configured(&self) -> bool {
        !self.root.as_os_str().is_empty()
    }

    async fn store(&self, name: &str, bytes: &[u8]) -> Result<(), BackendError> {
        let target = self.path_for(name)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| self.unavailable(e))?;
        let partial = self.root.join(format!(".{name}{PARTIAL_SUFFIX}"));
        fs::write(&partial, bytes)
            .await
            .map_err(|e| self.unavailable(e))?;
        fs::rename(&partial, &target)
            .await
            .map_err(|e| self.unavailable(e))?;
        debug!(backend = %self.name, object = name, bytes = bytes.len(), "object written");
        Ok(())
    }

    async fn retrieve(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        let path = self.path_for(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BackendError::NotFound {
                backend: self.name.clone(),
                name: name.to_string(),
            }),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), BackendError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, BackendError> {
        let path = self.path_for(name)?;
        fs::try_exists(&path).await.map_err(|e| self.unavailable(e))
    }

    async fn list(&self) -> Result<Vec<String>, BackendError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.unavailable(e)),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.unavailable(e))? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with('.') && file_name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            names.push(file_name);
        }
        Ok(names)
    }
}
