//! # Payload Field Sealing
//!
//! Applies the [`Sealer`] to the sealed fields of a payload. A sealed field
//! is stored as the base64 wire blob of its JSON-encoded value. The
//! additional data is the canonical encoding of the entity type, the field
//! name and the rendered values of the field's extras.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rowseal_core::{CanonicalBytes, KeyTimestamp, PrimaryKey};
use rowseal_crypto::Sealer;
use serde::Serialize;
use serde_json::Value;

use crate::descriptor::{EncryptedField, EntityDescriptor};
use crate::error::MapperError;
use crate::form::render_field;
use crate::sealed::REDACTION_PLACEHOLDER;
use crate::tuple::Payload;

#[derive(Serialize)]
struct AdditionalData<'a> {
    entity: &'a str,
    field: &'a str,
    extras: Vec<String>,
}

fn additional_data(
    descriptor: &EntityDescriptor,
    field: &EncryptedField,
    payload: &Payload,
) -> Result<CanonicalBytes, MapperError> {
    let extras = field
        .extras
        .iter()
        .map(|name| render_field(descriptor, name, payload.get(name)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CanonicalBytes::new(&AdditionalData {
        entity: descriptor.name().as_str(),
        field: &field.name,
        extras,
    })?)
}

/// Replace every sealed field of a plaintext payload with its ciphertext.
///
/// Null and missing values stay as they are. A value still holding the
/// redaction placeholder is refused.
pub(crate) fn encrypt_fields(
    descriptor: &EntityDescriptor,
    payload: &mut Payload,
    sealer: &Sealer,
) -> Result<(), MapperError> {
    for field in descriptor.encrypted_fields() {
        let plaintext = match payload.get(&field.name) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) if s == REDACTION_PLACEHOLDER => {
                return Err(MapperError::RedactedField {
                    entity: descriptor.name().clone(),
                    field: field.name.clone(),
                })
            }
            Some(value) => serde_json::to_vec(value)?,
        };
        let aad = additional_data(descriptor, field, payload)?;
        let (sealed, key) = sealer.encrypt(&plaintext, aad.as_bytes()).map_err(|e| {
            tracing::debug!(entity = %descriptor.name(), field = %field.name, error = %e, "field encryption failed");
            MapperError::Crypto {
                entity: descriptor.name().clone(),
                operation: "encrypt",
            }
        })?;
        tracing::trace!(entity = %descriptor.name(), field = %field.name, key = %key, "field sealed");
        payload.insert(field.name.clone(), Value::String(BASE64.encode(sealed)));
    }
    Ok(())
}

/// Replace every sealed field of a stored payload with its plaintext.
///
/// Returns the key timestamp that opened each field. Null and missing
/// values stay as they are; any other value that is not a ciphertext
/// string is `DecryptionUnavailable`.
pub(crate) fn decrypt_fields(
    descriptor: &EntityDescriptor,
    pk: &PrimaryKey,
    payload: &mut Payload,
    sealer: &Sealer,
) -> Result<BTreeMap<String, KeyTimestamp>, MapperError> {
    let mut keys = BTreeMap::new();
    for field in descriptor.encrypted_fields() {
        let unavailable = || {
            metrics::counter!("rowseal_decryption_failures_total", "entity" => descriptor.name().to_string())
                .increment(1);
            MapperError::DecryptionUnavailable {
                entity: descriptor.name().clone(),
                key: pk.clone(),
                field: field.name.clone(),
            }
        };
        let stored = match payload.get(&field.name) {
            None | Some(Value::Null) => continue,
            Some(Value::String(stored)) => stored,
            Some(_) => {
                tracing::debug!(entity = %descriptor.name(), key = %pk, field = %field.name, "sealed field holds a non-string value");
                return Err(unavailable());
            }
        };
        let sealed = BASE64.decode(stored).map_err(|e| {
            tracing::debug!(entity = %descriptor.name(), key = %pk, field = %field.name, error = %e, "stored ciphertext is not base64");
            unavailable()
        })?;
        let aad = additional_data(descriptor, field, payload)?;
        let opened = sealer.decrypt(&sealed, aad.as_bytes()).map_err(|e| {
            tracing::debug!(entity = %descriptor.name(), key = %pk, field = %field.name, error = %e, "field decryption failed");
            unavailable()
        })?;
        let value: Value = serde_json::from_slice(&opened.plaintext)?;
        payload.insert(field.name.clone(), value);
        keys.insert(field.name.clone(), opened.key);
    }
    Ok(keys)
}

/// Find which key opens each sealed field without keeping the plaintext.
pub(crate) fn probe_fields(
    descriptor: &EntityDescriptor,
    payload: &Payload,
    sealer: Option<&Sealer>,
) -> BTreeMap<String, Option<KeyTimestamp>> {
    descriptor
        .encrypted_fields()
        .iter()
        .filter_map(|field| {
            let stored = payload.get(&field.name).filter(|v| !v.is_null())?;
            let key = sealer.and_then(|sealer| {
                let sealed = BASE64.decode(stored.as_str()?).ok()?;
                let aad = additional_data(descriptor, field, payload).ok()?;
                sealer.decrypt(&sealed, aad.as_bytes()).ok().map(|o| o.key)
            });
            Some((field.name.clone(), key))
        })
        .collect()
}

/// Replace every non-null sealed field with the redaction placeholder.
pub(crate) fn redact_fields(descriptor: &EntityDescriptor, payload: &mut Payload) {
    for field in descriptor.encrypted_fields() {
        if let Some(value) = payload.get_mut(&field.name) {
            if !value.is_null() {
                *value = Value::String(REDACTION_PLACEHOLDER.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rowseal_crypto::aead::Aes256GcmAlgorithm;
    use rowseal_crypto::{AeadAlgorithm, KeyEntry, RollingKeySet, SecretBytes};
    use serde_json::json;

    use super::*;
    use crate::descriptor::FieldKind;

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::builder("vcs.Project", "projects")
            .field("id", FieldKind::Text)
            .field("token", FieldKind::Text)
            .field("config", FieldKind::Json)
            .primary_key(["id"])
            .encrypt("token", ["id"])
            .encrypt("config", ["id"])
            .build()
            .unwrap()
    }

    fn sealer(timestamps: &[i64]) -> Sealer {
        let entries = timestamps
            .iter()
            .map(|ts| {
                KeyEntry::new(
                    KeyTimestamp(*ts),
                    Arc::new(Aes256GcmAlgorithm) as Arc<dyn AeadAlgorithm>,
                    SecretBytes::new(vec![*ts as u8; 32]),
                )
            })
            .collect();
        Sealer::new(RollingKeySet::new("encryption", entries).unwrap())
    }

    fn payload(v: Value) -> Payload {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_encrypt_then_decrypt_restores_values() {
        let d = descriptor();
        let s = sealer(&[1]);
        let original = payload(json!({"id": "p1", "token": "secret", "config": {"depth": 3}}));
        let mut p = original.clone();
        encrypt_fields(&d, &mut p, &s).unwrap();
        assert_ne!(p["token"], json!("secret"));
        assert!(p["config"].is_string());
        assert_eq!(p["id"], json!("p1"));

        let keys = decrypt_fields(&d, &PrimaryKey::from("p1"), &mut p, &s).unwrap();
        assert_eq!(p, original);
        assert_eq!(keys["token"], KeyTimestamp(1));
    }

    #[test]
    fn test_null_fields_are_left_alone() {
        let d = descriptor();
        let mut p = payload(json!({"id": "p1", "token": null}));
        encrypt_fields(&d, &mut p, &sealer(&[1])).unwrap();
        assert_eq!(p["token"], Value::Null);
        assert!(!p.contains_key("config"));
    }

    #[test]
    fn test_redacted_value_cannot_be_written() {
        let d = descriptor();
        let mut p = payload(json!({"id": "p1", "token": REDACTION_PLACEHOLDER}));
        assert!(matches!(
            encrypt_fields(&d, &mut p, &sealer(&[1])),
            Err(MapperError::RedactedField { field, .. }) if field == "token"
        ));
    }

    #[test]
    fn test_ciphertext_bound_to_row() {
        let d = descriptor();
        let s = sealer(&[1]);
        let mut p = payload(json!({"id": "p1", "token": "secret"}));
        encrypt_fields(&d, &mut p, &s).unwrap();
        p.insert("id".into(), json!("p2"));
        assert!(matches!(
            decrypt_fields(&d, &PrimaryKey::from("p2"), &mut p, &s),
            Err(MapperError::DecryptionUnavailable { .. })
        ));
    }

    #[test]
    fn test_non_string_sealed_value_is_unavailable() {
        let d = descriptor();
        let s = sealer(&[1]);
        for stored in [json!({"plain": true}), json!(42), json!(["a"])] {
            let mut p = payload(json!({"id": "p1", "token": stored.clone()}));
            assert!(matches!(
                decrypt_fields(&d, &PrimaryKey::from("p1"), &mut p, &s),
                Err(MapperError::DecryptionUnavailable { field, .. }) if field == "token"
            ));
            assert_eq!(p["token"], stored);
            assert_eq!(probe_fields(&d, &p, Some(&s)).get("token"), Some(&None));
        }
        let mut empty = payload(json!({"id": "p1", "token": null}));
        assert!(decrypt_fields(&d, &PrimaryKey::from("p1"), &mut empty, &s).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_key_is_unavailable() {
        let d = descriptor();
        let mut p = payload(json!({"id": "p1", "token": "secret"}));
        encrypt_fields(&d, &mut p, &sealer(&[1])).unwrap();
        assert!(matches!(
            decrypt_fields(&d, &PrimaryKey::from("p1"), &mut p, &sealer(&[2])),
            Err(MapperError::DecryptionUnavailable { .. })
        ));
    }

    #[test]
    fn test_probe_reports_keys_without_plaintext() {
        let d = descriptor();
        let mut p = payload(json!({"id": "p1", "token": "secret"}));
        encrypt_fields(&d, &mut p, &sealer(&[1])).unwrap();
        let probed = probe_fields(&d, &p, Some(&sealer(&[1, 2])));
        assert_eq!(probed.get("token"), Some(&Some(KeyTimestamp(1))));
        assert!(!probed.contains_key("config"));
        let unknown = probe_fields(&d, &p, Some(&sealer(&[3])));
        assert_eq!(unknown.get("token"), Some(&None));
    }

    #[test]
    fn test_redact() {
        let d = descriptor();
        let mut p = payload(json!({"id": "p1", "token": "abc", "config": null}));
        redact_fields(&d, &mut p);
        assert_eq!(p["token"], json!(REDACTION_PLACEHOLDER));
        assert_eq!(p["config"], Value::Null);
    }
}
