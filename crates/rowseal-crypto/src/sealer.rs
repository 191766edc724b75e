//! # Field Sealer
//!
//! Encrypts sensitive field values with the current key of the encryption
//! set and opens them with whichever configured key works. The encryption
//! set rotates independently of the signature set.

use rowseal_core::KeyTimestamp;

use crate::aead::AeadAlgorithm;
use crate::error::CryptoError;
use crate::keys::RollingKeySet;

/// Plaintext recovered by [`Sealer::decrypt`] with the key that opened it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    /// Recovered plaintext.
    pub plaintext: Vec<u8>,
    /// Timestamp of the key that opened the content.
    pub key: KeyTimestamp,
}

/// Seals and opens field values with a rolling key set.
#[derive(Debug, Clone)]
pub struct Sealer {
    keys: RollingKeySet<dyn AeadAlgorithm>,
}

impl Sealer {
    /// Wrap a validated encryption key set.
    pub fn new(keys: RollingKeySet<dyn AeadAlgorithm>) -> Self {
        Self { keys }
    }

    /// The underlying key set.
    pub fn keys(&self) -> &RollingKeySet<dyn AeadAlgorithm> {
        &self.keys
    }

    /// Timestamp of the key used for new ciphertexts.
    pub fn current_key(&self) -> KeyTimestamp {
        self.keys.current().timestamp()
    }

    /// Encrypt `plaintext` with the current key, binding `aad`.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<(Vec<u8>, KeyTimestamp), CryptoError> {
        let entry = self.keys.current();
        let sealed = entry
            .algorithm()
            .seal(entry.secret().expose(), plaintext, aad)?;
        Ok((sealed, entry.timestamp()))
    }

    /// Open `sealed` with the first configured key that authenticates it.
    ///
    /// Individual key failures are logged at debug level; the caller only
    /// learns that no key matched.
    pub fn decrypt(&self, sealed: &[u8], aad: &[u8]) -> Result<Opened, CryptoError> {
        for entry in self.keys.iter() {
            match entry.algorithm().open(entry.secret().expose(), sealed, aad) {
                Ok(plaintext) => {
                    return Ok(Opened {
                        plaintext,
                        key: entry.timestamp(),
                    })
                }
                Err(e) => {
                    tracing::debug!(key = %entry.timestamp(), error = %e, "encryption key did not open content");
                }
            }
        }
        Err(CryptoError::NoMatchingKey)
    }
}
