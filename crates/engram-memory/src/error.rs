//! Error type shared by every memory operation.

use engram_crypto::CryptoError;
use engram_storage::RouterError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MemoryError {
    /// A stored key failed validation. Ciphertext written under it is
    /// considered unrecoverable.
    #[error("invalid encryption key: {0}")]
    KeyInvalid(String),

    /// Stored ciphertext did not authenticate under the chamber key.
    #[error("message {record} failed to decrypt")]
    DecryptionFailed { record: Uuid },

    /// Every storage backend failed or none is configured.
    #[error("storage backends unavailable: {0}")]
    BackendUnavailable(#[from] RouterError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("crypto error: {0}")]
    Crypto(CryptoError),
}

impl From<CryptoError> for MemoryError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyInvalid(reason) => MemoryError::KeyInvalid(reason),
            other => MemoryError::Crypto(other),
        }
    }
}

impl MemoryError {
    pub(crate) fn chamber_not_found(id: Uuid) -> Self {
        MemoryError::NotFound { kind: "chamber", id }
    }

    pub(crate) fn message_not_found(id: Uuid) -> Self {
        MemoryError::NotFound { kind: "message", id }
    }
}
