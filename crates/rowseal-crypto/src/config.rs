//! # Keyring Configuration
//!
//! The keyring is a YAML document with two lists of key entries:
//!
//! ```yaml
//! signature_keys:
//!   - timestamp: 100
//!     cipher: hmac-sha256
//!     key: 3f0c...            # hex
//! encryption_keys:
//!   - cipher: aes-256-gcm     # timestamp defaults to the list position
//!     key: 9a11...
//! ```
//!
//! [`KeyringConfig::build`] resolves cipher names through a
//! [`CipherSuite`], decodes and length-checks the key material and
//! validates each rolling set. Any problem is a [`KeyringError`], which
//! the host treats as fatal.

use std::path::Path;
use std::sync::Arc;

use rowseal_core::KeyTimestamp;
use serde::{Deserialize, Serialize};

use crate::error::KeyringError;
use crate::keys::{KeyEntry, RollingKeySet};
use crate::sealer::Sealer;
use crate::secret::SecretBytes;
use crate::signer::Signer;
use crate::snapshot::KeySnapshot;
use crate::suite::CipherSuite;

const SIGNATURE_SET: &str = "signature";
const ENCRYPTION_SET: &str = "encryption";

/// One configured key. `Debug` redacts the key material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntryConfig {
    /// Identifier and priority. Defaults to the entry's list index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Algorithm name, resolved through the cipher suite.
    pub cipher: String,
    /// Hex-encoded secret material.
    pub key: String,
}

impl std::fmt::Debug for KeyEntryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEntryConfig")
            .field("timestamp", &self.timestamp)
            .field("cipher", &self.cipher)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Keyring document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyringConfig {
    /// Keys for tuple signatures.
    #[serde(default)]
    pub signature_keys: Vec<KeyEntryConfig>,
    /// Keys for field encryption.
    #[serde(default)]
    pub encryption_keys: Vec<KeyEntryConfig>,
}

impl KeyringConfig {
    /// Parse a YAML keyring document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, KeyringError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML keyring file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, KeyringError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Resolve and validate both key sets.
    ///
    /// An empty list leaves the corresponding set unconfigured.
    pub fn build(&self, suite: &CipherSuite) -> Result<KeySnapshot, KeyringError> {
        let signer = if self.signature_keys.is_empty() {
            None
        } else {
            let entries = self
                .signature_keys
                .iter()
                .enumerate()
                .map(|(index, entry)| {
                    let timestamp = resolve_timestamp(entry, index);
                    let algorithm = suite.mac(&entry.cipher).ok_or_else(|| KeyringError::UnknownCipher {
                        set: SIGNATURE_SET,
                        cipher: entry.cipher.clone(),
                    })?;
                    let secret = decode_secret(SIGNATURE_SET, timestamp, &entry.key)?;
                    if secret.len() < algorithm.min_key_len() {
                        return Err(KeyringError::InvalidKey {
                            set: SIGNATURE_SET,
                            timestamp: timestamp.value(),
                            reason: format!(
                                "{} requires at least {} bytes, got {}",
                                algorithm.name(),
                                algorithm.min_key_len(),
                                secret.len()
                            ),
                        });
                    }
                    Ok(KeyEntry::new(timestamp, algorithm, secret))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Some(Signer::new(RollingKeySet::new(SIGNATURE_SET, entries)?))
        };

        let sealer = if self.encryption_keys.is_empty() {
            None
        } else {
            let entries = self
                .encryption_keys
                .iter()
                .enumerate()
                .map(|(index, entry)| {
                    let timestamp = resolve_timestamp(entry, index);
                    let algorithm = suite.aead(&entry.cipher).ok_or_else(|| KeyringError::UnknownCipher {
                        set: ENCRYPTION_SET,
                        cipher: entry.cipher.clone(),
                    })?;
                    let secret = decode_secret(ENCRYPTION_SET, timestamp, &entry.key)?;
                    if secret.len() != algorithm.key_len() {
                        return Err(KeyringError::InvalidKey {
                            set: ENCRYPTION_SET,
                            timestamp: timestamp.value(),
                            reason: format!(
                                "{} requires exactly {} bytes, got {}",
                                algorithm.name(),
                                algorithm.key_len(),
                                secret.len()
                            ),
                        });
                    }
                    Ok(KeyEntry::new(timestamp, algorithm, secret))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Some(Sealer::new(RollingKeySet::new(ENCRYPTION_SET, entries)?))
        };

        if let Some(signer) = &signer {
            tracing::info!(
                current = %signer.current_key(),
                keys = signer.keys().len(),
                "signature key set loaded"
            );
        }
        if let Some(sealer) = &sealer {
            tracing::info!(
                current = %sealer.current_key(),
                keys = sealer.keys().len(),
                "encryption key set loaded"
            );
        }

        Ok(KeySnapshot::new(signer, sealer))
    }
}

fn resolve_timestamp(entry: &KeyEntryConfig, index: usize) -> KeyTimestamp {
    KeyTimestamp(entry.timestamp.unwrap_or(index as i64))
}

fn decode_secret(set: &'static str, timestamp: KeyTimestamp, key: &str) -> Result<SecretBytes, KeyringError> {
    SecretBytes::from_hex(key).map_err(|e| KeyringError::InvalidKey {
        set,
        timestamp: timestamp.value(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn hex_key(byte: u8, len: usize) -> String {
        hex::encode(vec![byte; len])
    }

    fn sig(ts: Option<i64>, byte: u8) -> KeyEntryConfig {
        KeyEntryConfig {
            timestamp: ts,
            cipher: "hmac-sha256".into(),
            key: hex_key(byte, 32),
        }
    }

    #[test]
    fn test_parse_yaml_document() {
        let yaml = format!(
            "signature_keys:\n  - timestamp: 100\n    cipher: hmac-sha256\n    key: {}\nencryption_keys:\n  - cipher: aes-256-gcm\n    key: {}\n",
            hex_key(1, 32),
            hex_key(2, 32)
        );
        let config = KeyringConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.signature_keys[0].timestamp, Some(100));
        assert_eq!(config.encryption_keys[0].timestamp, None);

        let snapshot = config.build(&CipherSuite::default()).unwrap();
        assert_eq!(snapshot.signer().unwrap().current_key(), KeyTimestamp(100));
        assert_eq!(snapshot.sealer().unwrap().current_key(), KeyTimestamp(0));
    }

    #[test]
    fn test_missing_timestamp_defaults_to_position() {
        let config = KeyringConfig {
            signature_keys: vec![sig(None, 1), sig(None, 2)],
            encryption_keys: vec![],
        };
        let snapshot = config.build(&CipherSuite::default()).unwrap();
        assert_eq!(snapshot.signer().unwrap().current_key(), KeyTimestamp(1));
        assert!(snapshot.sealer().is_none());
    }

    #[test]
    fn test_ambiguous_current_rejected() {
        let config = KeyringConfig {
            signature_keys: vec![sig(Some(7), 1), sig(Some(7), 2)],
            encryption_keys: vec![],
        };
        assert!(matches!(
            config.build(&CipherSuite::default()),
            Err(KeyringError::AmbiguousCurrent { timestamp: 7, .. })
        ));
    }

    #[test]
    fn test_unknown_cipher_rejected() {
        let config = KeyringConfig {
            signature_keys: vec![KeyEntryConfig {
                timestamp: None,
                cipher: "md5".into(),
                key: hex_key(1, 32),
            }],
            encryption_keys: vec![],
        };
        assert!(matches!(
            config.build(&CipherSuite::default()),
            Err(KeyringError::UnknownCipher { set: "signature", .. })
        ));
    }

    #[test]
    fn test_short_or_invalid_key_rejected() {
        let short = KeyringConfig {
            signature_keys: vec![KeyEntryConfig {
                timestamp: Some(1),
                cipher: "hmac-sha256".into(),
                key: hex_key(1, 8),
            }],
            encryption_keys: vec![],
        };
        assert!(matches!(
            short.build(&CipherSuite::default()),
            Err(KeyringError::InvalidKey { timestamp: 1, .. })
        ));

        let wrong_aes = KeyringConfig {
            signature_keys: vec![],
            encryption_keys: vec![KeyEntryConfig {
                timestamp: Some(2),
                cipher: "aes-128-gcm".into(),
                key: hex_key(1, 32),
            }],
        };
        assert!(matches!(
            wrong_aes.build(&CipherSuite::default()),
            Err(KeyringError::InvalidKey { set: "encryption", .. })
        ));

        let not_hex = KeyringConfig {
            signature_keys: vec![KeyEntryConfig {
                timestamp: Some(3),
                cipher: "hmac-sha256".into(),
                key: "xyz".into(),
            }],
            encryption_keys: vec![],
        };
        assert!(matches!(
            not_hex.build(&CipherSuite::default()),
            Err(KeyringError::InvalidKey { timestamp: 3, .. })
        ));
    }

    #[test]
    fn test_unknown_top_level_field_rejected() {
        assert!(matches!(
            KeyringConfig::from_yaml_str("signing_keys: []\n"),
            Err(KeyringError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let config = KeyringConfig {
            signature_keys: vec![sig(Some(100), 1), sig(Some(200), 2)],
            encryption_keys: vec![],
        };
        file.write_all(serde_yaml::to_string(&config).unwrap().as_bytes())
            .unwrap();

        let loaded = KeyringConfig::from_path(file.path()).unwrap();
        assert_eq!(loaded, config);
        let snapshot = loaded.build(&CipherSuite::default()).unwrap();
        assert_eq!(
            snapshot.signer().unwrap().keys().timestamps(),
            vec![KeyTimestamp(200), KeyTimestamp(100)]
        );
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let rendered = format!("{:?}", sig(Some(1), 0xab));
        assert!(!rendered.contains("abab"));
        assert!(rendered.contains("hmac-sha256"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            KeyringConfig::from_path("/nonexistent/rowseal-keys.yaml"),
            Err(KeyringError::Io(_))
        ));
    }
}
