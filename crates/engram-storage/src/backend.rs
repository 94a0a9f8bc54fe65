//! The Storage Backend abstraction.
//!
//! Engram never speaks directly to a storage provider. It hands ciphertext to
//! the [`RedundancyRouter`][crate::router::RedundancyRouter], which fans it out
//! to one or more [`StorageBackend`] implementations.
//!
//! # Overview
//!
//! - [`StorageBackend`] – the trait every provider must implement.
//! - [`InMemoryBackend`][crate::memory::InMemoryBackend] – process-local map.
//! - [`DirectoryBackend`][crate::directory::DirectoryBackend] – a local or
//!   mounted directory.
//! - [`HttpObjectBackend`][crate::http::HttpObjectBackend] – managed object
//!   storage over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by a single backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend '{backend}' is not configured")]
    NotConfigured { backend: String },

    #[error("object '{name}' not found on backend '{backend}'")]
    NotFound { backend: String, name: String },

    #[error("backend '{backend}' unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("backend '{backend}' timed out after {after:?}")]
    Timeout { backend: String, after: Duration },

    #[error("invalid object name '{0}'")]
    InvalidName(String),
}

/// Every storage provider must implement this trait.
///
/// # Contract
///
/// * Payloads are ciphertext produced by the caller; backends store and
///   return them verbatim and never see key material.
/// * `is_configured` is a cheap precondition check and must not perform
///   network I/O.
/// * `retrieve` of an absent object returns [`BackendError::NotFound`].
/// * `delete` of an absent object is not an error.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stable, human-readable identifier used in logs and failure reports.
    fn name(&self) -> &str;

    /// Routing priority; `0` is tried first.
    fn priority(&self) -> u32;

    fn is_configured(&self) -> bool;

    async fn store(&self, name: &str, bytes: &[u8]) -> Result<(), BackendError>;

    async fn retrieve(&self, name: &str) -> Result<Vec<u8>, BackendError>;

    async fn delete(&self, name: &str) -> Result<(), BackendError>;

    async fn exists(&self, name: &str) -> Result<bool, BackendError>;

    /// Names of every stored object, in no particular order.
    async fn list(&self) -> Result<Vec<String>, BackendError>;
}

/// Maximum accepted object-name length in bytes.
pub const MAX_OBJECT_NAME_LEN: usize = 255;

/// Reject names that could escape a directory or break a URL path.
pub fn validate_object_name(name: &str) -> Result<(), BackendError> {
    let bad = name.is_empty()
        || name.len() > MAX_OBJECT_NAME_LEN
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.chars().any(char::is_control);
    if bad {
        Err(BackendError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consolidated_names_are_valid() {
        assert!(validate_object_name("memory_6f1c.json").is_ok());
    }

    #[test]
    fn traversal_and_separators_are_rejected() {
        for name in ["", ".", "../etc/passwd", "a/b", "a\\b", "nul\0byte"] {
            assert!(
                matches!(validate_object_name(name), Err(BackendError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn overlong_name_is_rejected() {
        let name = "x".repeat(MAX_OBJECT_NAME_LEN + 1);
        assert!(validate_object_name(&name).is_err());
    }
}
