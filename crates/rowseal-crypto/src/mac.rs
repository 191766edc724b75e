//! # Keyed MAC Algorithms
//!
//! Tuple signatures are keyed MACs over canonical bytes. The algorithm is
//! chosen per key entry by name, so a rotation may also change the
//! algorithm.
//!
//! Verification uses the primitive's constant-time tag comparison.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use crate::error::CryptoError;

/// A keyed MAC usable for tuple signatures.
pub trait MacAlgorithm: Send + Sync + std::fmt::Debug {
    /// Configuration name of the algorithm.
    fn name(&self) -> &'static str;

    /// Minimum accepted key length in bytes.
    fn min_key_len(&self) -> usize;

    /// Compute the tag of `message` under `key`.
    fn compute(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Check `tag` against `message` under `key` in constant time.
    fn verify(&self, key: &[u8], message: &[u8], tag: &[u8]) -> bool;
}

macro_rules! hmac_algorithm {
    ($ty:ident, $digest:ty, $name:literal, $min:expr) => {
        #[doc = concat!("`", $name, "`.")]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $ty;

        impl MacAlgorithm for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn min_key_len(&self) -> usize {
                $min
            }

            fn compute(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError> {
                let mut mac = Hmac::<$digest>::new_from_slice(key)
                    .map_err(|e| CryptoError::KeyError(e.to_string()))?;
                mac.update(message);
                Ok(mac.finalize().into_bytes().to_vec())
            }

            fn verify(&self, key: &[u8], message: &[u8], tag: &[u8]) -> bool {
                match Hmac::<$digest>::new_from_slice(key) {
                    Ok(mut mac) => {
                        mac.update(message);
                        mac.verify_slice(tag).is_ok()
                    }
                    Err(_) => false,
                }
            }
        }
    };
}

hmac_algorithm!(HmacSha256, Sha256, "hmac-sha256", 32);
hmac_algorithm!(HmacSha512, Sha512, "hmac-sha512", 64);
