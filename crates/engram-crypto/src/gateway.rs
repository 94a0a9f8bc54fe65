//! AES-256-GCM encryption over opaque byte buffers.
//!
//! # Wire format
//!
//! | bytes | content |
//! |---|---|
//! | `0..12` | random 96-bit nonce, fresh per call |
//! | `12..` | ciphertext followed by the 16-byte GCM tag |
//!
//! Both functions are pure apart from nonce generation.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use crate::CryptoError;
use crate::key::ChamberKey;

/// Nonce length for AES-GCM.
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under `key`.
pub fn encrypt(plaintext: &[u8], key: &ChamberKey) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt a buffer produced by [`encrypt`].
///
/// Returns [`CryptoError::DecryptionFailed`] and no partial output when the
/// buffer is truncated, tampered with, or sealed under a different key.
pub fn decrypt(ciphertext: &[u8], key: &ChamberKey) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::DecryptionFailed);
    }
    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::DecryptionFailed)?;
    let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_key;

    #[test]
    fn roundtrip_restores_plaintext() {
        let key = generate_key();
        for payload in [&b""[..], b"hello", &[0u8; 4096][..]] {
            let sealed = encrypt(payload, &key).unwrap();
            assert_eq!(decrypt(&sealed, &key).unwrap(), payload);
        }
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let key = generate_key();
        let a = encrypt(b"repeat", &key).unwrap();
        let b = encrypt(b"repeat", &key).unwrap();
        assert_ne!(a, b, "nonce must be fresh per call");
    }

    #[test]
    fn wrong_key_fails_closed() {
        let sealed = encrypt(b"secret", &generate_key()).unwrap();
        let err = decrypt(&sealed, &generate_key()).unwrap_err();
        assert_eq!(err, CryptoError::DecryptionFailed);
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let key = generate_key();
        let mut sealed = encrypt(b"do not touch", &key).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert_eq!(decrypt(&sealed, &key).unwrap_err(), CryptoError::DecryptionFailed);
    }

    #[test]
    fn truncated_input_fails_closed() {
        let key = generate_key();
        assert_eq!(decrypt(&[1, 2, 3], &key).unwrap_err(), CryptoError::DecryptionFailed);
        assert_eq!(decrypt(&[], &key).unwrap_err(), CryptoError::DecryptionFailed);
    }
}
