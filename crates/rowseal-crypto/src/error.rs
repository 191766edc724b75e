//! # Crypto Errors
//!
//! `CryptoError` covers per-call primitive failures; `KeyringError` covers
//! configuration problems that must abort startup.

use thiserror::Error;

/// Error in a cryptographic operation.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key material was rejected by the primitive.
    #[error("key error: {0}")]
    KeyError(String),

    /// Sealing (encryption) failed.
    #[error("seal failed: {0}")]
    SealFailed(String),

    /// The sealed blob is malformed or could not be opened with the given key.
    #[error("open failed: {0}")]
    OpenFailed(String),

    /// No configured key could open the sealed blob.
    #[error("no configured key opens this content")]
    NoMatchingKey,

    /// A signature could not be decoded.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

/// Keyring misconfiguration. Fatal at startup.
#[derive(Error, Debug)]
pub enum KeyringError {
    /// A rolling key set has no entries.
    #[error("{set} key set is empty")]
    Empty {
        /// Name of the key set (`signature` or `encryption`).
        set: &'static str,
    },

    /// Two entries share the highest timestamp, so no single key is current.
    #[error("{set} key set has ambiguous current key: several entries with timestamp {timestamp}")]
    AmbiguousCurrent {
        /// Name of the key set.
        set: &'static str,
        /// The duplicated timestamp.
        timestamp: i64,
    },

    /// Two entries share a timestamp, so they cannot be told apart.
    #[error("{set} key set has duplicate timestamp {timestamp}")]
    DuplicateTimestamp {
        /// Name of the key set.
        set: &'static str,
        /// The duplicated timestamp.
        timestamp: i64,
    },

    /// The cipher name is not registered in the cipher suite.
    #[error("{set} key set references unknown cipher {cipher:?}")]
    UnknownCipher {
        /// Name of the key set.
        set: &'static str,
        /// The unresolved cipher name.
        cipher: String,
    },

    /// Key material could not be decoded or has the wrong size.
    #[error("{set} key {timestamp}: {reason}")]
    InvalidKey {
        /// Name of the key set.
        set: &'static str,
        /// Timestamp of the offending entry.
        timestamp: i64,
        /// What was wrong with it.
        reason: String,
    },

    /// A key set required by the registered entities is not configured.
    #[error("no {set} keys configured but {reason}")]
    Missing {
        /// Name of the key set.
        set: &'static str,
        /// Why the set is required.
        reason: String,
    },

    /// The keyring document could not be parsed.
    #[error("keyring parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The keyring file could not be read.
    #[error("keyring io error: {0}")]
    Io(#[from] std::io::Error),
}
