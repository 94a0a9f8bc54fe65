//! `engram-crypto` – the Encryption Gateway.
//!
//! Every payload that leaves the process or lands on disk passes through
//! this crate first. It does not store anything; it only turns plaintext into
//! authenticated ciphertext and back.
//!
//! # Modules
//!
//! - [`key`] – [`ChamberKey`][key::ChamberKey]: the validated 32-byte
//!   symmetric key, its canonical 44-character encoded form, and the
//!   [`is_valid`][key::is_valid] well-formedness check that rejects legacy
//!   placeholder identifiers (e.g. UUIDs) stored where a key was expected.
//! - [`gateway`] – [`encrypt`][gateway::encrypt] /
//!   [`decrypt`][gateway::decrypt]: AES-256-GCM over opaque byte buffers.
//!   Decryption fails closed on tampering or a wrong key.
//! - [`derive`] – [`derive_record_key`][derive::derive_record_key]:
//!   HKDF-SHA256 derivation of deterministic per-record keys used for
//!   consolidated uploads.

pub mod derive;
pub mod gateway;
pub mod key;

use thiserror::Error;

pub use derive::derive_record_key;
pub use gateway::{decrypt, encrypt};
pub use key::{generate_key, is_valid, ChamberKey};

/// Errors raised by the Encryption Gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The key string is not a well-formed encoded 32-byte key.
    #[error("invalid key: {0}")]
    KeyInvalid(String),

    /// Tampered ciphertext, wrong key, or truncated input.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}
