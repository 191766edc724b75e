//! # Queries
//!
//! Field-equality filters over stored payloads. Sealed fields hold
//! ciphertext with a fresh nonce per write, so filtering on them is
//! rejected before the query reaches storage.
//!
//! Filter values must be scalars and each field may appear once. Under
//! those rules exact equality ([`Query::matches`]) and JSONB containment
//! ([`Query::as_containment`]) select the same rows.

use serde_json::Value;

use crate::descriptor::EntityDescriptor;
use crate::error::MapperError;
use crate::tuple::Payload;

/// Conjunction of `field == value` filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<(String, Value)>,
}

impl Query {
    /// Match every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality filter.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// The filters, in insertion order.
    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    /// True if a payload satisfies every filter.
    pub fn matches(&self, payload: &Payload) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| payload.get(field) == Some(value))
    }

    /// JSON object suitable for a containment (`@>`) filter.
    pub fn as_containment(&self) -> Value {
        Value::Object(self.filters.iter().cloned().collect())
    }

    pub(crate) fn validate(&self, descriptor: &EntityDescriptor) -> Result<(), MapperError> {
        for (i, (field, value)) in self.filters.iter().enumerate() {
            let reason = if descriptor.field(field).is_none() {
                format!("field {field:?} is not declared")
            } else if descriptor.encrypted_field(field).is_some() {
                format!("field {field:?} is sealed and cannot be filtered on")
            } else if value.is_array() || value.is_object() {
                format!("field {field:?} must be compared with a scalar value")
            } else if self.filters[..i].iter().any(|(seen, _)| seen == field) {
                format!("field {field:?} is filtered more than once")
            } else {
                continue;
            };
            return Err(MapperError::InvalidQuery {
                entity: descriptor.name().clone(),
                reason,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.filters.is_empty() {
            return f.write_str("*");
        }
        for (i, (field, value)) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{field}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldKind;
    use serde_json::json;

    #[test]
    fn test_matches() {
        let q = Query::all().eq("name", "foo").eq("n", 2);
        let payload = json!({"name": "foo", "n": 2, "x": true});
        assert!(q.matches(payload.as_object().unwrap()));
        let other = json!({"name": "foo", "n": 3});
        assert!(!q.matches(other.as_object().unwrap()));
        assert!(Query::all().matches(other.as_object().unwrap()));
    }

    #[test]
    fn test_containment_and_display() {
        let q = Query::all().eq("name", "foo");
        assert_eq!(q.as_containment(), json!({"name": "foo"}));
        assert_eq!(q.to_string(), "name=\"foo\"");
        assert_eq!(Query::all().to_string(), "*");
    }

    #[test]
    fn test_validate_rejects_sealed_and_undeclared() {
        let d = EntityDescriptor::builder("p", "p")
            .field("id", FieldKind::Text)
            .field("token", FieldKind::Text)
            .primary_key(["id"])
            .encrypt("token", ["id"])
            .build()
            .unwrap();
        assert!(Query::all().eq("id", "1").validate(&d).is_ok());
        assert!(matches!(
            Query::all().eq("token", "x").validate(&d),
            Err(MapperError::InvalidQuery { .. })
        ));
        assert!(matches!(
            Query::all().eq("nope", "x").validate(&d),
            Err(MapperError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_validate_keeps_equality_and_containment_aligned() {
        let d = EntityDescriptor::builder("p", "p")
            .field("id", FieldKind::Text)
            .field("tags", FieldKind::Json)
            .primary_key(["id"])
            .build()
            .unwrap();
        // Containment would accept a superset array; equality would not.
        let subset = Query::all().eq("tags", json!([1]));
        assert!(subset.as_containment()["tags"].is_array());
        assert!(matches!(subset.validate(&d), Err(MapperError::InvalidQuery { .. })));
        assert!(Query::all().eq("tags", json!({"a": 1})).validate(&d).is_err());

        // A repeated field would collapse into one containment key.
        let repeated = Query::all().eq("id", "1").eq("id", "2");
        assert_eq!(repeated.as_containment(), json!({"id": "2"}));
        assert!(matches!(repeated.validate(&d), Err(MapperError::InvalidQuery { .. })));

        assert!(Query::all().eq("id", "1").eq("tags", 3).validate(&d).is_ok());
        assert!(Query::all().eq("tags", Value::Null).validate(&d).is_ok());
    }
}
