//! Deterministic per-record key derivation.
//!
//! Consolidated uploads are sealed under a key derived from a long-lived
//! consolidation secret and the record id, so a retried upload for the same
//! record always uses the same key and any replica can be opened later from
//! the id alone.

use hkdf::Hkdf;
use sha2::Sha256;
use uuid::Uuid;

use crate::CryptoError;
use crate::key::{ChamberKey, KEY_LEN};

const DERIVATION_SALT: &[u8] = b"engram/consolidated-record/v1";

/// Derive the upload key for `record_id` from `secret` (HKDF-SHA256).
pub fn derive_record_key(secret: &ChamberKey, record_id: Uuid) -> Result<ChamberKey, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(DERIVATION_SALT), secret.as_bytes());
    let mut okm = [0u8; KEY_LEN];
    hk.expand(record_id.as_bytes(), &mut okm)
        .map_err(|e| CryptoError::KeyInvalid(format!("derivation failed: {e}")))?;
    Ok(ChamberKey::from_bytes(okm))
}
