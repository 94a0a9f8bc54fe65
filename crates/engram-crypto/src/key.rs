//! [`ChamberKey`] – validated symmetric key material.
//!
//! The canonical serialized form of a key is exactly 44 characters of
//! standard-alphabet base64 that decode to 32 raw bytes. The standard
//! alphabet never produces `-`, so a hyphen is a reliable marker of a legacy
//! identifier (such as a 36-character UUID) that was stored in the key slot.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CryptoError;

/// Raw key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Length of the encoded key string.
pub const ENCODED_KEY_LEN: usize = 44;

// ─────────────────────────────────────────────────────────────────────────────
// ChamberKey
// ─────────────────────────────────────────────────────────────────────────────

/// A well-formed 256-bit symmetric key. Zeroized on drop.
///
/// Only obtainable through [`generate_key`], [`ChamberKey::parse`] or
/// [`ChamberKey::from_bytes`], so holding one proves validity.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ChamberKey {
    bytes: [u8; KEY_LEN],
}

impl ChamberKey {
    /// Parse an encoded key, enforcing every [`is_valid`] property.
    pub fn parse(encoded: &str) -> Result<Self, CryptoError> {
        if encoded.len() != ENCODED_KEY_LEN {
            return Err(CryptoError::KeyInvalid(format!(
                "expected {ENCODED_KEY_LEN} encoded characters, found {}",
                encoded.len()
            )));
        }
        if encoded.contains('-') {
            return Err(CryptoError::KeyInvalid(
                "contains a '-' separator (legacy identifier?)".to_string(),
            ));
        }
        let mut decoded = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::KeyInvalid(format!("not decodable: {e}")))?;
        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::KeyInvalid(format!(
                "decodes to {len} bytes, expected {KEY_LEN}"
            )));
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// The canonical 44-character encoded form.
    pub fn encoded(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for ChamberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChamberKey(<redacted>)")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Free functions
// ─────────────────────────────────────────────────────────────────────────────

/// Generate a fresh random key from the OS-seeded thread RNG.
pub fn generate_key() -> ChamberKey {
    let mut bytes = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    ChamberKey { bytes }
}

/// Check the three well-formedness properties of an encoded key: exact
/// length, successful decode to 32 bytes, and no `-` separator.
pub fn is_valid(encoded: &str) -> bool {
    ChamberKey::parse(encoded).is_ok()
}
