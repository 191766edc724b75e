//! # Tuple Signer
//!
//! Signs canonical bytes with the current key of the signature set and
//! verifies a stored signature against every key of the set, current key
//! first.
//!
//! ## Security Invariant
//!
//! Accepts only `&CanonicalBytes`. A pre-image that did not go through the
//! canonical form builder cannot be signed.

use rowseal_core::{CanonicalBytes, KeyTimestamp};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::keys::{KeyEntry, RollingKeySet};
use crate::mac::MacAlgorithm;

/// A signature produced by [`Signer::sign`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Lowercase hex MAC tag.
    pub hex: String,
    /// Timestamp of the key that produced it.
    pub key: KeyTimestamp,
}

/// Signs and verifies canonical pre-images with a rolling key set.
#[derive(Debug, Clone)]
pub struct Signer {
    keys: RollingKeySet<dyn MacAlgorithm>,
}

impl Signer {
    /// Wrap a validated signature key set.
    pub fn new(keys: RollingKeySet<dyn MacAlgorithm>) -> Self {
        Self { keys }
    }

    /// The underlying key set.
    pub fn keys(&self) -> &RollingKeySet<dyn MacAlgorithm> {
        &self.keys
    }

    /// Timestamp of the key used for new signatures.
    pub fn current_key(&self) -> KeyTimestamp {
        self.keys.current().timestamp()
    }

    /// Sign `data` with the current key.
    pub fn sign(&self, data: &CanonicalBytes) -> Result<Signature, CryptoError> {
        let entry = self.keys.current();
        let tag = entry
            .algorithm()
            .compute(entry.secret().expose(), data.as_bytes())?;
        Ok(Signature {
            hex: hex::encode(tag),
            key: entry.timestamp(),
        })
    }

    /// Find the key that produced `signature_hex` over `data`.
    ///
    /// Returns `None` when no configured key reproduces it, including when
    /// the stored signature is not valid hex.
    pub fn verify(&self, data: &CanonicalBytes, signature_hex: &str) -> Option<KeyTimestamp> {
        let tag = match decode_signature(signature_hex) {
            Ok(tag) => tag,
            Err(e) => {
                tracing::debug!(error = %e, "stored signature is not decodable");
                return None;
            }
        };
        self.keys
            .iter()
            .find(|entry| verify_with(entry, data, &tag))
            .map(KeyEntry::timestamp)
    }
}

fn verify_with(entry: &KeyEntry<dyn MacAlgorithm>, data: &CanonicalBytes, tag: &[u8]) -> bool {
    entry
        .algorithm()
        .verify(entry.secret().expose(), data.as_bytes(), tag)
}

fn decode_signature(signature_hex: &str) -> Result<Vec<u8>, CryptoError> {
    if signature_hex.is_empty() {
        return Err(CryptoError::MalformedSignature("empty signature".into()));
    }
    hex::decode(signature_hex).map_err(|e| CryptoError::MalformedSignature(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mac::{HmacSha256, HmacSha512};
    use crate::secret::SecretBytes;

    fn key(ts: i64, byte: u8) -> KeyEntry<dyn MacAlgorithm> {
        KeyEntry::new(
            KeyTimestamp(ts),
            Arc::new(HmacSha256) as Arc<dyn MacAlgorithm>,
            SecretBytes::new(vec![byte; 32]),
        )
    }

    fn signer(entries: Vec<KeyEntry<dyn MacAlgorithm>>) -> Signer {
        Signer::new(RollingKeySet::new("signature", entries).unwrap())
    }

    fn data(value: &str) -> CanonicalBytes {
        CanonicalBytes::new(&serde_json::json!({"values": [value]})).unwrap()
    }

    #[test]
    fn test_sign_uses_current_key() {
        let s = signer(vec![key(100, 1), key(200, 2)]);
        let sig = s.sign(&data("foo")).unwrap();
        assert_eq!(sig.key, KeyTimestamp(200));
        assert_eq!(sig.hex.len(), 64);
        assert_eq!(s.current_key(), KeyTimestamp(200));
    }

    #[test]
    fn test_sign_is_deterministic() {
        let s = signer(vec![key(1, 1)]);
        assert_eq!(s.sign(&data("a")).unwrap(), s.sign(&data("a")).unwrap());
    }

    #[test]
    fn test_verify_finds_historical_key() {
        let old = signer(vec![key(100, 1)]);
        let sig = old.sign(&data("foo")).unwrap();

        let rotated = signer(vec![key(100, 1), key(200, 2)]);
        assert_eq!(rotated.verify(&data("foo"), &sig.hex), Some(KeyTimestamp(100)));
    }

    #[test]
    fn test_verify_fails_after_key_removed() {
        let old = signer(vec![key(100, 1)]);
        let sig = old.sign(&data("foo")).unwrap();

        let only_new = signer(vec![key(200, 2)]);
        assert_eq!(only_new.verify(&data("foo"), &sig.hex), None);
    }

    #[test]
    fn test_verify_rejects_modified_data() {
        let s = signer(vec![key(1, 1)]);
        let sig = s.sign(&data("foo")).unwrap();
        assert_eq!(s.verify(&data("fop"), &sig.hex), None);
    }

    #[test]
    fn test_verify_rejects_garbage_signatures() {
        let s = signer(vec![key(1, 1)]);
        assert_eq!(s.verify(&data("foo"), ""), None);
        assert_eq!(s.verify(&data("foo"), "not-hex"), None);
        assert_eq!(s.verify(&data("foo"), "00ff"), None);
    }

    #[test]
    fn test_mixed_algorithms_in_one_set() {
        let sha512 = KeyEntry::new(
            KeyTimestamp(300),
            Arc::new(HmacSha512) as Arc<dyn MacAlgorithm>,
            SecretBytes::new(vec![3; 64]),
        );
        let s = signer(vec![key(100, 1), sha512]);
        let sig = s.sign(&data("foo")).unwrap();
        assert_eq!(sig.hex.len(), 128);
        assert_eq!(s.verify(&data("foo"), &sig.hex), Some(KeyTimestamp(300)));
    }
}
