//! # AEAD Field Sealing
//!
//! Sensitive fields are sealed with an AEAD cipher. The additional
//! authenticated data binds the ciphertext to its entity type, column and
//! declared extras so a sealed value cannot be moved to another row.
//!
//! Wire format (version 1):
//! `[1 byte: version][12 bytes: nonce][N bytes: ciphertext + 16-byte tag]`

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::RngCore;

use crate::error::CryptoError;

/// Current wire format version.
pub const SEALED_VERSION: u8 = 1;
/// Nonce length for AES-GCM.
pub const NONCE_LENGTH: usize = 12;
/// Authentication tag length for AES-GCM.
pub const TAG_LENGTH: usize = 16;

/// An AEAD cipher usable for field sealing.
pub trait AeadAlgorithm: Send + Sync + std::fmt::Debug {
    /// Configuration name of the algorithm.
    fn name(&self) -> &'static str;

    /// Exact key length in bytes.
    fn key_len(&self) -> usize;

    /// Encrypt `plaintext` under `key`, binding `aad`.
    fn seal(&self, key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt a blob produced by [`AeadAlgorithm::seal`].
    fn open(&self, key: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

fn random_nonce() -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

macro_rules! aes_gcm_algorithm {
    ($ty:ident, $cipher:ty, $name:literal, $key_len:expr) => {
        #[doc = concat!("`", $name, "`.")]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $ty;

        impl AeadAlgorithm for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn key_len(&self) -> usize {
                $key_len
            }

            fn seal(&self, key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
                let cipher = <$cipher>::new_from_slice(key)
                    .map_err(|e| CryptoError::KeyError(e.to_string()))?;
                let nonce = random_nonce();
                let ciphertext = cipher
                    .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
                    .map_err(|e| CryptoError::SealFailed(e.to_string()))?;

                let mut sealed = Vec::with_capacity(1 + NONCE_LENGTH + ciphertext.len());
                sealed.push(SEALED_VERSION);
                sealed.extend_from_slice(&nonce);
                sealed.extend_from_slice(&ciphertext);
                Ok(sealed)
            }

            fn open(&self, key: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
                if sealed.len() < 1 + NONCE_LENGTH + TAG_LENGTH {
                    return Err(CryptoError::OpenFailed("sealed content too short".into()));
                }
                if sealed[0] != SEALED_VERSION {
                    return Err(CryptoError::OpenFailed(format!(
                        "unsupported sealed version {}",
                        sealed[0]
                    )));
                }
                let cipher = <$cipher>::new_from_slice(key)
                    .map_err(|e| CryptoError::KeyError(e.to_string()))?;
                let nonce = Nonce::from_slice(&sealed[1..1 + NONCE_LENGTH]);
                cipher
                    .decrypt(nonce, Payload { msg: &sealed[1 + NONCE_LENGTH..], aad })
                    .map_err(|e| CryptoError::OpenFailed(e.to_string()))
            }
        }
    };
}

aes_gcm_algorithm!(Aes256GcmAlgorithm, Aes256Gcm, "aes-256-gcm", 32);
aes_gcm_algorithm!(Aes128GcmAlgorithm, Aes128Gcm, "aes-128-gcm", 16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = [9u8; 32];
        let sealed = Aes256GcmAlgorithm.seal(&key, b"secret", b"ctx").unwrap();
        assert_eq!(sealed[0], SEALED_VERSION);
        assert_eq!(sealed.len(), 1 + NONCE_LENGTH + 6 + TAG_LENGTH);
        let opened = Aes256GcmAlgorithm.open(&key, &sealed, b"ctx").unwrap();
        assert_eq!(opened, b"secret");
    }

    #[test]
    fn test_nonce_is_fresh_per_seal() {
        let key = [9u8; 16];
        let a = Aes128GcmAlgorithm.seal(&key, b"same", b"").unwrap();
        let b = Aes128GcmAlgorithm.seal(&key, b"same", b"").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_with_wrong_aad_fails() {
        let key = [3u8; 32];
        let sealed = Aes256GcmAlgorithm.seal(&key, b"token", b"row-1").unwrap();
        assert!(Aes256GcmAlgorithm.open(&key, &sealed, b"row-2").is_err());
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let sealed = Aes256GcmAlgorithm.seal(&[3u8; 32], b"token", b"").unwrap();
        assert!(Aes256GcmAlgorithm.open(&[4u8; 32], &sealed, b"").is_err());
    }

    #[test]
    fn test_truncated_and_versioned_blobs_rejected() {
        let key = [3u8; 32];
        assert!(Aes256GcmAlgorithm.open(&key, &[SEALED_VERSION; 10], b"").is_err());
        let mut sealed = Aes256GcmAlgorithm.seal(&key, b"x", b"").unwrap();
        sealed[0] = 9;
        assert!(Aes256GcmAlgorithm.open(&key, &sealed, b"").is_err());
    }

    #[test]
    fn test_wrong_key_length_is_key_error() {
        assert!(matches!(
            Aes256GcmAlgorithm.seal(&[0u8; 16], b"x", b""),
            Err(CryptoError::KeyError(_))
        ));
    }
}
