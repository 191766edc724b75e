//! # Canonical Form Builder
//!
//! Renders a stored payload through one canonical form into the exact
//! pre-image that is signed. The pre-image is the JCS encoding of
//!
//! ```json
//! {"entity": "<type>", "form": "<form id>", "values": ["v1", "v2", ...]}
//! ```
//!
//! with one string per form field, in form order. Binding the entity and
//! form identifiers means a signature is never valid for another type or
//! another form of the same type.
//!
//! ## Rendering
//!
//! | Kind      | Rendering                                   |
//! |-----------|---------------------------------------------|
//! | Text      | the string                                  |
//! | Integer   | decimal                                     |
//! | Boolean   | `true` / `false`                            |
//! | Timestamp | `YYYY-MM-DDTHH:MM:SSZ`, verbatim            |
//! | Json      | JCS of the value                            |
//! | Blob      | `sha256:<hex>` of the bytes                 |
//! | sealed    | `sha256:<hex>` of the ciphertext            |
//!
//! Missing and null values render as the empty string. A stored timestamp
//! in any other spelling (offsets, fractional seconds) does not render, so
//! the signed string is exactly the stored one. Writes normalize
//! timestamps before signing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rowseal_core::{sha256_content, CanonicalBytes, Timestamp};
use serde::Serialize;
use serde_json::Value;

use crate::descriptor::{CanonicalForm, EntityDescriptor, FieldKind};
use crate::error::MapperError;
use crate::tuple::Payload;

#[derive(Serialize)]
struct PreImage<'a> {
    entity: &'a str,
    form: &'a str,
    values: Vec<String>,
}

/// Build the signing pre-image of `payload` under `form`.
///
/// `payload` is the stored representation: sealed fields hold ciphertext.
pub fn preimage(
    descriptor: &EntityDescriptor,
    form: &CanonicalForm,
    payload: &Payload,
) -> Result<CanonicalBytes, MapperError> {
    let values = form
        .fields()
        .iter()
        .map(|name| render_field(descriptor, name, payload.get(name)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CanonicalBytes::new(&PreImage {
        entity: descriptor.name().as_str(),
        form: form.id().as_str(),
        values,
    })?)
}

/// Render one stored field value as it appears in pre-images and
/// additional data.
pub(crate) fn render_field(
    descriptor: &EntityDescriptor,
    name: &str,
    value: Option<&Value>,
) -> Result<String, MapperError> {
    let value = match value {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(v) => v,
    };
    let invalid = |reason: String| MapperError::InvalidField {
        entity: descriptor.name().clone(),
        field: name.to_string(),
        reason,
    };

    if descriptor.encrypted_field(name).is_some() {
        let sealed = value
            .as_str()
            .ok_or_else(|| invalid("holds no ciphertext".into()))?;
        let bytes = BASE64
            .decode(sealed)
            .map_err(|e| invalid(format!("ciphertext is not base64: {e}")))?;
        return Ok(sha256_content(&bytes).to_string());
    }

    let kind = descriptor
        .field(name)
        .map(|f| f.kind)
        .ok_or_else(|| invalid("is not declared".into()))?;
    match (kind, value) {
        (FieldKind::Text, Value::String(s)) => Ok(s.clone()),
        (FieldKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        (FieldKind::Boolean, Value::Bool(b)) => Ok(b.to_string()),
        (FieldKind::Timestamp, Value::String(s)) => {
            let canonical = Timestamp::parse(s).map_err(|e| invalid(e.to_string()))?.to_iso8601();
            if canonical != *s {
                return Err(invalid(format!("timestamp {s:?} is not in canonical form {canonical:?}")));
            }
            Ok(canonical)
        }
        (FieldKind::Json, v) => {
            let canonical = CanonicalBytes::new(v)?;
            Ok(String::from_utf8_lossy(canonical.as_bytes()).into_owned())
        }
        (FieldKind::Blob, v) => Ok(sha256_content(&blob_bytes(v).ok_or_else(|| {
            invalid("must be a base64 string or a byte array".into())
        })?)
        .to_string()),
        (kind, v) => Err(invalid(format!("expected {kind:?}, found {}", json_type(v)))),
    }
}

fn blob_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) => BASE64.decode(s).ok(),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect(),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::builder("app.Item", "items")
            .field("id", FieldKind::Text)
            .field("count", FieldKind::Integer)
            .field("enabled", FieldKind::Boolean)
            .field("at", FieldKind::Timestamp)
            .field("meta", FieldKind::Json)
            .field("data", FieldKind::Blob)
            .field("token", FieldKind::Text)
            .primary_key(["id"])
            .form(["id", "count", "enabled", "at", "meta", "data", "token"])
            .form(["id"])
            .encrypt("token", ["id"])
            .build()
            .unwrap()
    }

    fn payload(v: Value) -> Payload {
        v.as_object().cloned().unwrap()
    }

    fn values(bytes: &CanonicalBytes) -> Vec<String> {
        let v: Value = serde_json::from_slice(bytes.as_bytes()).unwrap();
        serde_json::from_value(v["values"].clone()).unwrap()
    }

    #[test]
    fn test_render_every_kind() {
        let d = descriptor();
        let p = payload(json!({
            "id": "i1",
            "count": 7,
            "enabled": true,
            "at": "2026-03-01T10:00:00Z",
            "meta": {"b": 1, "a": [true]},
            "data": [1, 2, 3],
            "token": BASE64.encode(b"ciphertext"),
        }));
        let rendered = values(&preimage(&d, &d.forms()[0], &p).unwrap());
        assert_eq!(rendered[0], "i1");
        assert_eq!(rendered[1], "7");
        assert_eq!(rendered[2], "true");
        assert_eq!(rendered[3], "2026-03-01T10:00:00Z");
        assert_eq!(rendered[4], r#"{"a":[true],"b":1}"#);
        assert_eq!(rendered[5], sha256_content(&[1, 2, 3]).to_string());
        assert_eq!(rendered[6], sha256_content(b"ciphertext").to_string());
    }

    #[test]
    fn test_blob_base64_and_array_agree() {
        let d = descriptor();
        let a = render_field(&d, "data", Some(&json!(BASE64.encode([9u8, 8])))).unwrap();
        let b = render_field(&d, "data", Some(&json!([9, 8]))).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("sha256:"));
    }

    #[test]
    fn test_missing_and_null_render_empty() {
        let d = descriptor();
        assert_eq!(render_field(&d, "count", None).unwrap(), "");
        assert_eq!(render_field(&d, "count", Some(&Value::Null)).unwrap(), "");
        assert_eq!(render_field(&d, "token", None).unwrap(), "");
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let d = descriptor();
        assert!(matches!(
            render_field(&d, "count", Some(&json!("7"))),
            Err(MapperError::InvalidField { .. })
        ));
        assert!(render_field(&d, "count", Some(&json!(1.5))).is_err());
        assert!(render_field(&d, "at", Some(&json!("yesterday"))).is_err());
        assert!(render_field(&d, "data", Some(&json!([300]))).is_err());
        assert!(render_field(&d, "meta", Some(&json!({"f": 0.5}))).is_err());
    }

    #[test]
    fn test_only_canonical_timestamps_render() {
        let d = descriptor();
        assert_eq!(
            render_field(&d, "at", Some(&json!("2026-03-01T10:00:00Z"))).unwrap(),
            "2026-03-01T10:00:00Z"
        );
        for spelling in ["2026-03-01T10:00:00.100Z", "2026-03-01T10:00:00.999Z", "2026-03-01T10:00:00+00:00"] {
            assert!(
                matches!(render_field(&d, "at", Some(&json!(spelling))), Err(MapperError::InvalidField { .. })),
                "{spelling}"
            );
        }
    }

    #[test]
    fn test_preimage_binds_entity_and_form() {
        let d = descriptor();
        let p = payload(json!({"id": "i1"}));
        let latest = preimage(&d, &d.forms()[0], &p).unwrap();
        let older = preimage(&d, &d.forms()[1], &p).unwrap();
        assert_ne!(latest, older);
        let text = String::from_utf8(older.as_bytes().to_vec()).unwrap();
        assert!(text.contains(r#""entity":"app.Item""#));
        assert!(text.contains(d.forms()[1].id().as_str()));
    }

    #[test]
    fn test_unreferenced_fields_do_not_affect_preimage() {
        let d = descriptor();
        let a = preimage(&d, &d.forms()[1], &payload(json!({"id": "i1", "count": 1}))).unwrap();
        let b = preimage(&d, &d.forms()[1], &payload(json!({"id": "i1", "count": 2}))).unwrap();
        assert_eq!(a, b);
    }
}
