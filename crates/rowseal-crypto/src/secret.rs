//! # Secret Material
//!
//! `SecretBytes` holds raw key bytes. The buffer is zeroed on drop and the
//! `Debug` implementation never prints the content.

use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Raw key material, zeroed on drop.
#[derive(Clone)]
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    /// Wrap raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Decode hex-encoded key material.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CryptoError::KeyError(format!("key material is not valid hex: {e}")))?;
        Ok(Self::new(bytes))
    }

    /// Generate `len` bytes from the operating system RNG.
    pub fn random(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    /// Render as lowercase hex. Only meant for key generation output.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_slice())
    }

    /// Access the raw bytes.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no key material is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes(<{} bytes redacted>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let secret = SecretBytes::from_hex("00ff10").unwrap();
        assert_eq!(secret.expose(), &[0x00, 0xff, 0x10]);
        assert_eq!(secret.to_hex(), "00ff10");
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(SecretBytes::from_hex("zz").is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let secret = SecretBytes::from_hex("deadbeef").unwrap();
        let debug = format!("{secret:?}");
        assert!(!debug.contains("deadbeef"));
        assert!(debug.contains("4 bytes"));
    }

    #[test]
    fn test_random_length() {
        assert_eq!(SecretBytes::random(32).len(), 32);
        assert_ne!(SecretBytes::random(32).expose(), SecretBytes::random(32).expose());
    }
}
