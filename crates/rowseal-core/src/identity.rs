//! # Identity Newtypes
//!
//! Newtype wrappers for the identifiers that flow through the sealing
//! layer. These prevent accidental identifier confusion: a signing key
//! timestamp cannot be passed where a primary key is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Identifier of a registered entity type (e.g. `project.Application`).
///
/// Restricted to ASCII alphanumerics plus `_`, `.`, `-` and `:` so it is
/// safe to embed in URLs, log fields and canonical pre-images.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityName(String);

impl EntityName {
    /// Validate and wrap an entity type identifier.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::InvalidIdentifier(
                "entity name must not be empty".into(),
            ));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':')))
        {
            return Err(CoreError::InvalidIdentifier(format!(
                "entity name {name:?} contains invalid character {c:?}"
            )));
        }
        Ok(Self(name))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityName> for String {
    fn from(value: EntityName) -> Self {
        value.0
    }
}

impl std::fmt::Display for EntityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Primary key of a stored tuple, rendered as text.
///
/// Composite keys are rendered by joining the column values with
/// [`PrimaryKey::SEPARATOR`] in declaration order. Within a composite key
/// each value has `%` and `/` percent-encoded, so distinct column values
/// never render to the same key. Single-column keys are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimaryKey(String);

impl PrimaryKey {
    /// Separator between the columns of a composite key.
    pub const SEPARATOR: char = '/';

    /// Wrap an already rendered key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generate a random UUID v4 key.
    pub fn random_uuid() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Render a key from its column values.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parts: Vec<S> = parts.into_iter().collect();
        if let [single] = parts.as_slice() {
            return Self(single.as_ref().to_string());
        }
        let mut key = String::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                key.push(Self::SEPARATOR);
            }
            for c in part.as_ref().chars() {
                match c {
                    '%' => key.push_str("%25"),
                    Self::SEPARATOR => key.push_str("%2F"),
                    c => key.push(c),
                }
            }
        }
        Self(key)
    }

    /// Access the rendered key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PrimaryKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PrimaryKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a canonical form: lowercase hex SHA-256 of the
/// form's field list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormId(String);

impl FormId {
    /// Wrap a hex digest. Accepts only 64 lowercase hex characters.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, CoreError> {
        let hex = hex.into();
        if hex.len() != 64 || !hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(CoreError::InvalidIdentifier(format!(
                "form id must be 64 lowercase hex chars, got {hex:?}"
            )));
        }
        Ok(Self(hex))
    }

    /// Access the full hex identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl TryFrom<String> for FormId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(value)
    }
}

impl From<FormId> for String {
    fn from(value: FormId) -> Self {
        value.0
    }
}

impl std::fmt::Display for FormId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Timestamp of a key configuration entry. Identifies the key and
/// orders it within its rolling key set: the highest value is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyTimestamp(pub i64);

impl KeyTimestamp {
    /// Access the raw value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for KeyTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_name_accepts_dotted() {
        let name = EntityName::new("project.Application").unwrap();
        assert_eq!(name.as_str(), "project.Application");
        assert_eq!(name.to_string(), "project.Application");
    }

    #[test]
    fn test_entity_name_rejects_empty_and_spaces() {
        assert!(EntityName::new("").is_err());
        assert!(EntityName::new("bad name").is_err());
        assert!(EntityName::new("drop;table").is_err());
    }

    #[test]
    fn test_entity_name_serde_validates() {
        let ok: EntityName = serde_json::from_str(r#""vcs.Project""#).unwrap();
        assert_eq!(ok.as_str(), "vcs.Project");
        assert!(serde_json::from_str::<EntityName>(r#""a b""#).is_err());
    }

    #[test]
    fn test_primary_key_from_parts() {
        assert_eq!(PrimaryKey::from_parts(["42"]).as_str(), "42");
        assert_eq!(PrimaryKey::from_parts(["proj", "7"]).as_str(), "proj/7");
        assert_eq!(PrimaryKey::from_parts(["a/b"]).as_str(), "a/b");
    }

    #[test]
    fn test_composite_parts_are_escaped() {
        let left = PrimaryKey::from_parts(["a/b", "c"]);
        let right = PrimaryKey::from_parts(["a", "b/c"]);
        assert_ne!(left, right);
        assert_eq!(left.as_str(), "a%2Fb/c");
        assert_eq!(right.as_str(), "a/b%2Fc");
        assert_ne!(PrimaryKey::from_parts(["%2F", "x"]), PrimaryKey::from_parts(["/", "x"]));
        assert_eq!(PrimaryKey::from_parts(["100%", "x"]).as_str(), "100%25/x");
    }

    #[test]
    fn test_random_uuid_keys_differ() {
        assert_ne!(PrimaryKey::random_uuid(), PrimaryKey::random_uuid());
    }

    #[test]
    fn test_form_id_validation() {
        let hex = "a".repeat(64);
        let id = FormId::from_hex(hex.clone()).unwrap();
        assert_eq!(id.short(), "aaaaaaaaaaaa");
        assert!(FormId::from_hex("abc").is_err());
        assert!(FormId::from_hex("A".repeat(64)).is_err());
    }

    #[test]
    fn test_key_timestamp_ordering() {
        assert!(KeyTimestamp(100) < KeyTimestamp(200));
        assert_eq!(KeyTimestamp(100).to_string(), "100");
    }
}
