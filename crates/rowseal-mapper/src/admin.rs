//! # Administrative Introspection
//!
//! Read-only views used to plan and monitor key rotation: which entity
//! types exist, how their rows are distributed over forms and signing
//! keys, and which key opens each sealed field of a row. Plaintext never
//! leaves these functions.

use std::collections::BTreeMap;

use rowseal_core::{EntityName, FormId, KeyTimestamp, PrimaryKey};
use serde::{Deserialize, Serialize};

use crate::descriptor::EntityDescriptor;
use crate::encryption::probe_fields;
use crate::error::MapperError;
use crate::mapper::Mapper;
use crate::query::Query;
use crate::signature::verify_tuple;
use crate::store::Executor;
use crate::tuple::Authenticity;

/// A canonical form as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSummary {
    /// Form identifier.
    pub id: FormId,
    /// Fields in signing order.
    pub fields: Vec<String>,
}

/// A registered entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    /// Type identifier.
    pub name: EntityName,
    /// Storage table.
    pub table: String,
    /// True if rows are signed.
    pub signed: bool,
    /// True if some fields are sealed.
    pub encrypted: bool,
    /// Primary-key columns.
    pub primary_key: Vec<String>,
    /// Canonical forms, newest first.
    pub forms: Vec<FormSummary>,
    /// Sealed fields.
    pub encrypted_fields: Vec<String>,
}

impl From<&EntityDescriptor> for EntitySummary {
    fn from(d: &EntityDescriptor) -> Self {
        Self {
            name: d.name().clone(),
            table: d.table().to_string(),
            signed: d.is_signed(),
            encrypted: d.is_encrypted(),
            primary_key: d.primary_key().to_vec(),
            forms: d
                .forms()
                .iter()
                .map(|f| FormSummary {
                    id: f.id().clone(),
                    fields: f.fields().to_vec(),
                })
                .collect(),
            encrypted_fields: d.encrypted_fields().iter().map(|f| f.name.clone()).collect(),
        }
    }
}

/// Number of rows signed with one form and key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureGroup {
    /// Matching form.
    pub form: FormId,
    /// Signing key timestamp.
    pub key: KeyTimestamp,
    /// Row count.
    pub count: usize,
}

/// Distribution of a signed entity's rows over forms and keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSummary {
    /// Entity type.
    pub entity: EntityName,
    /// Total stored rows.
    pub total: usize,
    /// Rows that verify under no form/key.
    pub unverified: usize,
    /// Verified rows grouped by form and key, latest form first, then
    /// newest key first.
    pub groups: Vec<SignatureGroup>,
}

/// Restricts [`Mapper::list_tuple_keys`] to rows signed with a given form
/// and/or key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleFilter {
    /// Only rows matching this form.
    pub form: Option<FormId>,
    /// Only rows signed with this key.
    pub key: Option<KeyTimestamp>,
}

impl TupleFilter {
    fn is_empty(&self) -> bool {
        self.form.is_none() && self.key.is_none()
    }
}

/// Security state of one stored row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleInfo {
    /// Entity type.
    pub entity: EntityName,
    /// Row key.
    pub key: PrimaryKey,
    /// Signature verification outcome.
    pub authenticity: Authenticity,
    /// True if the row is already signed with the latest form and current
    /// key and every sealed field uses the current encryption key.
    pub current: bool,
    /// Key that opens each non-null sealed field; `None` if no configured
    /// key does. Empty when authenticity could not be established.
    pub encryption: BTreeMap<String, Option<KeyTimestamp>>,
}

impl Mapper {
    /// Describe every registered entity type.
    pub fn list_entities(&self) -> Vec<EntitySummary> {
        self.registry().list().map(EntitySummary::from).collect()
    }

    /// Count the rows of a signed entity by form and signing key.
    pub async fn signature_summary<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        entity: &str,
    ) -> Result<SignatureSummary, MapperError> {
        let descriptor = self.descriptor(entity)?;
        if !descriptor.is_signed() {
            return Err(MapperError::NotSigned(descriptor.name().clone()));
        }
        let keys = self.keys();
        let rows = exec
            .fetch_all(descriptor.table(), &Query::all())
            .await
            .map_err(MapperError::store(descriptor.name(), "select"))?;

        let mut counts: BTreeMap<(usize, std::cmp::Reverse<KeyTimestamp>), usize> = BTreeMap::new();
        let mut unverified = 0;
        for tuple in &rows {
            match verify_tuple(descriptor, tuple, keys.signer()) {
                Authenticity::Verified(m) => *counts.entry((m.form_index, std::cmp::Reverse(m.key))).or_default() += 1,
                _ => unverified += 1,
            }
        }
        let groups = counts
            .into_iter()
            .map(|((form_index, std::cmp::Reverse(key)), count)| SignatureGroup {
                form: descriptor.forms()[form_index].id().clone(),
                key,
                count,
            })
            .collect();

        Ok(SignatureSummary {
            entity: descriptor.name().clone(),
            total: rows.len(),
            unverified,
            groups,
        })
    }

    /// List row keys, optionally only those signed with a given form/key.
    ///
    /// Without a filter every stored key is listed, verified or not.
    pub async fn list_tuple_keys<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        entity: &str,
        filter: &TupleFilter,
    ) -> Result<Vec<PrimaryKey>, MapperError> {
        let descriptor = self.descriptor(entity)?;
        if !filter.is_empty() && !descriptor.is_signed() {
            return Err(MapperError::NotSigned(descriptor.name().clone()));
        }
        let keys = self.keys();
        let rows = exec
            .fetch_all(descriptor.table(), &Query::all())
            .await
            .map_err(MapperError::store(descriptor.name(), "select"))?;
        if filter.is_empty() {
            return Ok(rows.into_iter().map(|t| t.pk).collect());
        }
        Ok(rows
            .into_iter()
            .filter(|tuple| match verify_tuple(descriptor, tuple, keys.signer()) {
                Authenticity::Verified(m) => {
                    filter.form.as_ref().map_or(true, |f| f == &m.form) && filter.key.map_or(true, |k| k == m.key)
                }
                _ => false,
            })
            .map(|t| t.pk)
            .collect())
    }

    /// Report the signature and encryption state of one row.
    pub async fn tuple_info<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        entity: &str,
        pk: &PrimaryKey,
    ) -> Result<TupleInfo, MapperError> {
        let descriptor = self.descriptor(entity)?;
        let keys = self.keys();
        let tuple = exec
            .fetch_one(descriptor.table(), pk)
            .await
            .map_err(MapperError::store(descriptor.name(), "select"))?
            .ok_or_else(|| MapperError::NotFound {
                entity: descriptor.name().clone(),
                key: pk.to_string(),
            })?;

        let authenticity = verify_tuple(descriptor, &tuple, keys.signer());
        let encryption = if authenticity.is_accepted() {
            probe_fields(descriptor, &tuple.payload, keys.sealer())
        } else {
            BTreeMap::new()
        };

        let signed_current = match (&authenticity, keys.signer()) {
            (Authenticity::Unsigned, _) => true,
            (Authenticity::Verified(m), Some(signer)) => m.is_current(signer.current_key()),
            _ => false,
        };
        let sealed_current = match keys.sealer() {
            Some(sealer) => encryption.values().all(|k| *k == Some(sealer.current_key())),
            None => encryption.is_empty(),
        };

        Ok(TupleInfo {
            entity: descriptor.name().clone(),
            key: pk.clone(),
            current: authenticity.is_accepted() && signed_current && sealed_current,
            authenticity,
            encryption,
        })
    }
}

#[cfg(test)]
mod tests {
    use rowseal_crypto::{CipherSuite, KeySnapshot, KeyringConfig};
    use serde_json::json;

    use super::*;
    use crate::descriptor::FieldKind;
    use crate::registry::RegistryBuilder;
    use crate::store::{Database, MemoryDatabase};
    use crate::tuple::Payload;

    const KEYS_V1: &str = r#"
signature_keys:
  - timestamp: 1
    cipher: hmac-sha256
    key: "0101010101010101010101010101010101010101010101010101010101010101"
encryption_keys:
  - timestamp: 1
    cipher: aes-256-gcm
    key: "0202020202020202020202020202020202020202020202020202020202020202"
"#;

    const KEYS_V2: &str = r#"
signature_keys:
  - timestamp: 2
    cipher: hmac-sha256
    key: "0303030303030303030303030303030303030303030303030303030303030303"
  - timestamp: 1
    cipher: hmac-sha256
    key: "0101010101010101010101010101010101010101010101010101010101010101"
encryption_keys:
  - timestamp: 2
    cipher: aes-256-gcm
    key: "0404040404040404040404040404040404040404040404040404040404040404"
  - timestamp: 1
    cipher: aes-256-gcm
    key: "0202020202020202020202020202020202020202020202020202020202020202"
"#;

    fn keys(yaml: &str) -> KeySnapshot {
        KeyringConfig::from_yaml_str(yaml)
            .unwrap()
            .build(&CipherSuite::default())
            .unwrap()
    }

    fn mapper() -> Mapper {
        let mut builder = RegistryBuilder::new();
        builder
            .register(
                EntityDescriptor::builder("ci.Secret", "secrets")
                    .field("id", FieldKind::Text)
                    .field("value", FieldKind::Text)
                    .primary_key(["id"])
                    .form(["id", "value"])
                    .encrypt("value", ["id"])
                    .build()
                    .unwrap(),
            )
            .unwrap()
            .register(
                EntityDescriptor::builder("ci.Label", "labels")
                    .field("id", FieldKind::Text)
                    .primary_key(["id"])
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Mapper::new(builder.build(), keys(KEYS_V1)).unwrap()
    }

    fn secret(id: &str) -> Payload {
        json!({"id": id, "value": "hunter2"}).as_object().cloned().unwrap()
    }

    #[test]
    fn test_list_entities() {
        let m = mapper();
        let entities = m.list_entities();
        assert_eq!(entities.len(), 2);
        let secret = entities.iter().find(|e| e.name.as_str() == "ci.Secret").unwrap();
        assert!(secret.signed && secret.encrypted);
        assert_eq!(secret.forms[0].fields, vec!["id", "value"]);
        assert_eq!(secret.encrypted_fields, vec!["value"]);
        let label = entities.iter().find(|e| e.name.as_str() == "ci.Label").unwrap();
        assert!(!label.signed && label.forms.is_empty());
    }

    #[tokio::test]
    async fn test_signature_summary_groups_by_key() {
        let m = mapper();
        let db = MemoryDatabase::new();
        let mut exec = db.acquire().await.unwrap();
        m.insert_tuple(&mut *exec, "ci.Secret", secret("a")).await.unwrap();
        m.insert_tuple(&mut *exec, "ci.Secret", secret("b")).await.unwrap();
        m.reload_keys(keys(KEYS_V2)).unwrap();
        m.insert_tuple(&mut *exec, "ci.Secret", secret("c")).await.unwrap();
        db.tamper("secrets", &PrimaryKey::from("b"), |t| t.signature = Some("00".repeat(32)));

        let summary = m.signature_summary(&mut *exec, "ci.Secret").await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.unverified, 1);
        let counts: Vec<_> = summary.groups.iter().map(|g| (g.key.value(), g.count)).collect();
        assert_eq!(counts, vec![(2, 1), (1, 1)]);

        assert!(matches!(
            m.signature_summary(&mut *exec, "ci.Label").await,
            Err(MapperError::NotSigned(_))
        ));
    }

    #[tokio::test]
    async fn test_list_tuple_keys_filters_by_key() {
        let m = mapper();
        let db = MemoryDatabase::new();
        let mut exec = db.acquire().await.unwrap();
        m.insert_tuple(&mut *exec, "ci.Secret", secret("a")).await.unwrap();
        m.reload_keys(keys(KEYS_V2)).unwrap();
        m.insert_tuple(&mut *exec, "ci.Secret", secret("b")).await.unwrap();

        let all = m
            .list_tuple_keys(&mut *exec, "ci.Secret", &TupleFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        let old = m
            .list_tuple_keys(
                &mut *exec,
                "ci.Secret",
                &TupleFilter {
                    form: None,
                    key: Some(KeyTimestamp(1)),
                },
            )
            .await
            .unwrap();
        assert_eq!(old, vec![PrimaryKey::from("a")]);
        let unknown_form = TupleFilter {
            form: Some(FormId::from_hex(&"ab".repeat(32)).unwrap()),
            key: None,
        };
        assert!(m
            .list_tuple_keys(&mut *exec, "ci.Secret", &unknown_form)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_tuple_info_reports_keys_without_plaintext() {
        let m = mapper();
        let db = MemoryDatabase::new();
        let mut exec = db.acquire().await.unwrap();
        m.insert_tuple(&mut *exec, "ci.Secret", secret("a")).await.unwrap();
        let pk = PrimaryKey::from("a");

        let info = m.tuple_info(&mut *exec, "ci.Secret", &pk).await.unwrap();
        assert!(info.current);
        assert_eq!(info.encryption.get("value"), Some(&Some(KeyTimestamp(1))));
        assert!(!serde_json::to_string(&info).unwrap().contains("hunter2"));

        m.reload_keys(keys(KEYS_V2)).unwrap();
        let info = m.tuple_info(&mut *exec, "ci.Secret", &pk).await.unwrap();
        assert!(!info.current);
        assert_eq!(info.authenticity.signature_match().map(|s| s.key), Some(KeyTimestamp(1)));

        db.tamper("secrets", &pk, |t| t.signature = None);
        let info = m.tuple_info(&mut *exec, "ci.Secret", &pk).await.unwrap();
        assert_eq!(info.authenticity, Authenticity::Failed);
        assert!(info.encryption.is_empty());
        assert!(!info.current);

        assert!(matches!(
            m.tuple_info(&mut *exec, "ci.Secret", &PrimaryKey::from("zz")).await,
            Err(MapperError::NotFound { .. })
        ));
    }
}
