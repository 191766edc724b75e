//! # Sealed Field Values
//!
//! Domain types declare encrypted fields as `Sealed<T>`. A value read
//! without decryption comes back as [`Sealed::Redacted`], which serializes
//! to [`REDACTION_PLACEHOLDER`]. Writing a redacted value is refused by
//! the mapper, so a redacted read can never overwrite the real secret.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stand-in for a sealed value that was not decrypted.
pub const REDACTION_PLACEHOLDER: &str = "**********";

/// A sealed field value: either the clear value or its redaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sealed<T> {
    /// Decrypted (or not yet encrypted) value.
    Clear(T),
    /// The value was loaded without decryption.
    Redacted,
}

impl<T> Sealed<T> {
    /// Clear value, if present.
    pub fn clear(&self) -> Option<&T> {
        match self {
            Self::Clear(v) => Some(v),
            Self::Redacted => None,
        }
    }

    /// Consume into the clear value, if present.
    pub fn into_clear(self) -> Option<T> {
        match self {
            Self::Clear(v) => Some(v),
            Self::Redacted => None,
        }
    }

    /// True if the value was loaded without decryption.
    pub fn is_redacted(&self) -> bool {
        matches!(self, Self::Redacted)
    }
}

impl<T> From<T> for Sealed<T> {
    fn from(value: T) -> Self {
        Self::Clear(value)
    }
}

impl<T: Serialize> Serialize for Sealed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Clear(v) => v.serialize(serializer),
            Self::Redacted => serializer.serialize_str(REDACTION_PLACEHOLDER),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Sealed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        if value.as_str() == Some(REDACTION_PLACEHOLDER) {
            return Ok(Self::Redacted);
        }
        T::deserialize(value).map(Self::Clear).map_err(D::Error::custom)
    }
}
