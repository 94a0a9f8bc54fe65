//! Startup-time resolution of configured backends.
//!
//! The configuration lists backends as a tagged variant ([`BackendConfig`]);
//! [`build_backends`] turns that list into trait objects once, before the
//! router is constructed.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, StorageBackend};
use crate::directory::DirectoryBackend;
use crate::http::HttpObjectBackend;
use crate::memory::InMemoryBackend;

/// One `[[backends]]` entry of the configuration file.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory {
        name: String,
        #[serde(default)]
        priority: u32,
    },
    Directory {
        name: String,
        #[serde(default)]
        priority: u32,
        path: PathBuf,
    },
    Http {
        name: String,
        #[serde(default)]
        priority: u32,
        endpoint: String,
        bucket: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
}

impl BackendConfig {
    pub fn name(&self) -> &str {
        match self {
            BackendConfig::Memory { name, .. }
            | BackendConfig::Directory { name, .. }
            | BackendConfig::Http { name, .. } => name,
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendConfig::Memory { name, priority } => f
                .debug_struct("Memory")
                .field("name", name)
                .field("priority", priority)
                .finish(),
            BackendConfig::Directory { name, priority, path } => f
                .debug_struct("Directory")
                .field("name", name)
                .field("priority", priority)
                .field("path", path)
                .finish(),
            BackendConfig::Http {
                name,
                priority,
                endpoint,
                bucket,
                token,
            } => f
                .debug_struct("Http")
                .field("name", name)
                .field("priority", priority)
                .field("endpoint", endpoint)
                .field("bucket", bucket)
                .field("token", if token.is_some() { &"<redacted>" } else { &"<not set>" })
                .finish(),
        }
    }
}

/// Instantiate a single backend. `timeout` applies to network backends.
pub fn build_backend(
    config: &BackendConfig,
    timeout: Duration,
) -> Result<Arc<dyn StorageBackend>, BackendError> {
    let backend: Arc<dyn StorageBackend> = match config {
        BackendConfig::Memory { name, priority } => {
            Arc::new(InMemoryBackend::new(name.clone(), *priority))
        }
        BackendConfig::Directory { name, priority, path } => {
            Arc::new(DirectoryBackend::new(name.clone(), *priority, path.clone()))
        }
        BackendConfig::Http {
            name,
            priority,
            endpoint,
            bucket,
            token,
        } => Arc::new(HttpObjectBackend::new(
            name.clone(),
            *priority,
            endpoint.clone(),
            bucket.clone(),
            token.clone(),
            timeout,
        )?),
    };
    Ok(backend)
}

/// Instantiate every configured backend, preserving configuration order.
pub fn build_backends(
    configs: &[BackendConfig],
    timeout: Duration,
) -> Result<Vec<Arc<dyn StorageBackend>>, BackendError> {
    configs.iter().map(|c| build_backend(c, timeout)).collect()
}
