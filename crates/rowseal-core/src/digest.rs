//! # Content Digest
//!
//! Defines `ContentDigest` and `DigestAlgorithm`. Two entry points exist:
//!
//! - [`sha256_digest()`] hashes `CanonicalBytes` and is used to derive
//!   stable identifiers from structured data (canonical form ids).
//! - [`sha256_content()`] hashes opaque stored bytes (blobs, ciphertexts)
//!   so a canonical form can reference them without embedding their raw
//!   value in the signature pre-image.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

/// The hash algorithm used to produce a content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A digest with its algorithm tag.
///
/// Rendered as `sha256:<hex>` by `Display`, which is also the form used
/// inside canonical pre-images for opaque values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Create a new content digest from raw bytes and algorithm.
    pub fn new(algorithm: DigestAlgorithm, bytes: [u8; 32]) -> Self {
        Self { algorithm, bytes }
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Compute a SHA-256 digest from canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    sha256_raw(data.as_bytes())
}

/// Compute a SHA-256 digest of opaque content as stored.
///
/// Used for blob and ciphertext fields. The input is the exact stored
/// byte sequence; no canonicalization applies to opaque content.
pub fn sha256_content(content: &[u8]) -> ContentDigest {
    sha256_raw(content)
}

fn sha256_raw(data: &[u8]) -> ContentDigest {
    let hash = Sha256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest::new(DigestAlgorithm::Sha256, bytes)
}
