//! # Stored Tuples
//!
//! A [`Tuple`] is one persisted row: the rendered primary key, the JSON
//! payload of domain fields (sealed fields hold base64 ciphertext) and the
//! hex signature of signed types.

use rowseal_core::{FormId, KeyTimestamp, PrimaryKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object of domain fields.
pub type Payload = Map<String, Value>;

/// One persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuple {
    /// Rendered primary key.
    pub pk: PrimaryKey,
    /// Domain fields as stored.
    pub payload: Payload,
    /// Hex MAC over the latest form, absent for unsigned types.
    pub signature: Option<String>,
}

/// Which form and key reproduced a stored signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMatch {
    /// Matching form.
    pub form: FormId,
    /// Position of the form in the descriptor, 0 being the latest.
    pub form_index: usize,
    /// Signing key timestamp.
    pub key: KeyTimestamp,
}

impl SignatureMatch {
    /// True if the row was signed with the latest form and current key.
    pub fn is_current(&self, current_key: KeyTimestamp) -> bool {
        self.form_index == 0 && self.key == current_key
    }
}

/// Outcome of checking a stored tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Authenticity {
    /// The type is not signed; every row is accepted.
    Unsigned,
    /// A declared form and configured key reproduce the signature.
    Verified(SignatureMatch),
    /// No form/key combination reproduces the signature.
    Failed,
}

impl Authenticity {
    /// True unless verification failed.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Failed)
    }

    /// The signature match, for verified rows.
    pub fn signature_match(&self) -> Option<&SignatureMatch> {
        match self {
            Self::Verified(m) => Some(m),
            _ => None,
        }
    }
}

/// Result of a listing: verified items and the keys of dropped rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    /// Rows that passed verification, in primary-key order.
    pub items: Vec<T>,
    /// Rows dropped because their authenticity could not be established.
    pub dropped: Vec<PrimaryKey>,
}

impl<T> Listing<T> {
    /// True if no row was dropped.
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Read options for get and listing operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Decrypt sealed fields after verification. Off by default, in which
    /// case sealed fields are redacted.
    pub decrypt: bool,
}

impl LoadOptions {
    /// Options with decryption enabled.
    pub fn decrypted() -> Self {
        Self { decrypt: true }
    }
}
