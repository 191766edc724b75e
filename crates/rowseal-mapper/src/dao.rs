//! # DAO Operations
//!
//! Write pipeline (insert, update):
//!
//! 1. assign the identifier (insert, UUID strategy) and stamp the
//!    modification column;
//! 2. seal the encrypted fields with the current encryption key;
//! 3. render the latest canonical form over the stored representation and
//!    sign it with the current signing key;
//! 4. write through the caller's executor.
//!
//! Read pipeline (get, get_all): fetch, verify against every form and
//! key, then either redact or (when [`LoadOptions::decrypt`] is set)
//! decrypt the sealed fields. A row that fails verification is logged at
//! error level, counted in `rowseal_tuples_quarantined_total` and treated
//! as absent.
//!
//! DAO operations never open a transaction; they run on whatever
//! [`Executor`] the caller passes.

use rowseal_core::{KeyTimestamp, PrimaryKey, Timestamp};
use rowseal_crypto::KeySnapshot;
use serde::ser::Error as _;
use serde_json::Value;

use crate::descriptor::{EntityDescriptor, FieldKind, IdStrategy};
use crate::encryption::{decrypt_fields, encrypt_fields, redact_fields};
use crate::entity::Entity;
use crate::error::MapperError;
use crate::mapper::{require_sealer, require_signer, Mapper};
use crate::query::Query;
use crate::signature::{sign_payload, verify_tuple};
use crate::store::Executor;
use crate::tuple::{Authenticity, Listing, LoadOptions, Payload, SignatureMatch, Tuple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    Insert,
    Update,
    /// Re-seal and re-sign only; no identifier or timestamp changes.
    Roll,
}

/// A payload ready to be written.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub tuple: Tuple,
    pub plaintext: Payload,
    pub signature: Option<SignatureMatch>,
    pub encryption_key: Option<KeyTimestamp>,
}

pub(crate) fn prepare(
    descriptor: &EntityDescriptor,
    keys: &KeySnapshot,
    mut payload: Payload,
    mode: WriteMode,
) -> Result<Prepared, MapperError> {
    if let Some(field) = payload.keys().find(|k| descriptor.field(k).is_none()) {
        return Err(MapperError::InvalidField {
            entity: descriptor.name().clone(),
            field: field.clone(),
            reason: "is not declared".into(),
        });
    }

    if mode == WriteMode::Insert && descriptor.id_strategy() == IdStrategy::Uuid {
        for column in descriptor.primary_key() {
            if render_key_part(payload.get(column)).is_none() {
                payload.insert(column.clone(), Value::String(PrimaryKey::random_uuid().to_string()));
            }
        }
    }
    if mode != WriteMode::Roll {
        if let Some(column) = descriptor.modified_column() {
            payload.insert(column.to_string(), Value::String(Timestamp::now().to_iso8601()));
        }
    }

    normalize_timestamps(descriptor, &mut payload)?;

    let pk = primary_key(descriptor, &payload)?;
    let plaintext = payload.clone();

    let encryption_key = match require_sealer(keys, descriptor)? {
        Some(sealer) => {
            encrypt_fields(descriptor, &mut payload, sealer)?;
            Some(sealer.current_key())
        }
        None => None,
    };

    let (signature, matched) = match require_signer(keys, descriptor)? {
        Some(signer) => {
            let (signature, matched) = sign_payload(descriptor, &payload, signer)?;
            (Some(signature.hex), Some(matched))
        }
        None => (None, None),
    };

    Ok(Prepared {
        tuple: Tuple {
            pk,
            payload,
            signature,
        },
        plaintext,
        signature: matched,
        encryption_key,
    })
}

/// Rewrite plain timestamp fields to the second-precision UTC spelling
/// that signatures cover. Fractional seconds are dropped.
fn normalize_timestamps(descriptor: &EntityDescriptor, payload: &mut Payload) -> Result<(), MapperError> {
    for spec in descriptor.fields() {
        if spec.kind != FieldKind::Timestamp || descriptor.encrypted_field(&spec.name).is_some() {
            continue;
        }
        if let Some(Value::String(value)) = payload.get_mut(&spec.name) {
            let parsed = Timestamp::parse_lenient(value).map_err(|e| MapperError::InvalidField {
                entity: descriptor.name().clone(),
                field: spec.name.clone(),
                reason: e.to_string(),
            })?;
            *value = parsed.to_iso8601();
        }
    }
    Ok(())
}

fn render_key_part(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Render the primary key of a payload from its key columns.
pub fn primary_key(descriptor: &EntityDescriptor, payload: &Payload) -> Result<PrimaryKey, MapperError> {
    let parts = descriptor
        .primary_key()
        .iter()
        .map(|column| {
            render_key_part(payload.get(column)).ok_or_else(|| MapperError::MissingPrimaryKey {
                entity: descriptor.name().clone(),
                field: column.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PrimaryKey::from_parts(parts))
}

/// Log and count a row whose authenticity could not be established.
pub(crate) fn quarantine(descriptor: &EntityDescriptor, pk: &PrimaryKey, operation: &'static str) {
    tracing::error!(
        entity = %descriptor.name(),
        key = %pk,
        operation,
        "tuple signature does not verify under any form or key; treating row as absent"
    );
    metrics::counter!("rowseal_tuples_quarantined_total", "entity" => descriptor.name().to_string())
        .increment(1);
}

fn to_payload<T: Entity>(entity: &T) -> Result<Payload, MapperError> {
    match serde_json::to_value(entity)? {
        Value::Object(payload) => Ok(payload),
        _ => Err(serde_json::Error::custom(format!("{} must serialize to a JSON object", T::ENTITY)).into()),
    }
}

fn from_payload<T: Entity>(payload: Payload) -> Result<T, MapperError> {
    Ok(serde_json::from_value(Value::Object(payload))?)
}

impl Mapper {
    fn load(
        &self,
        descriptor: &EntityDescriptor,
        keys: &KeySnapshot,
        tuple: Tuple,
        options: LoadOptions,
        operation: &'static str,
    ) -> Result<Option<Payload>, MapperError> {
        if let Authenticity::Failed = verify_tuple(descriptor, &tuple, keys.signer()) {
            quarantine(descriptor, &tuple.pk, operation);
            return Ok(None);
        }
        let Tuple { pk, mut payload, .. } = tuple;
        if options.decrypt {
            if let Some(sealer) = require_sealer(keys, descriptor)? {
                decrypt_fields(descriptor, &pk, &mut payload, sealer)?;
            }
        } else {
            redact_fields(descriptor, &mut payload);
        }
        Ok(Some(payload))
    }

    /// Insert an untyped payload. Returns the plaintext payload as written,
    /// including the assigned identifier and modification time.
    pub async fn insert_tuple<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        entity: &str,
        payload: Payload,
    ) -> Result<Payload, MapperError> {
        let descriptor = self.descriptor(entity)?;
        let keys = self.keys();
        let prepared = prepare(descriptor, &keys, payload, WriteMode::Insert)?;
        exec.insert(descriptor.table(), &prepared.tuple)
            .await
            .map_err(MapperError::store(descriptor.name(), "insert"))?;
        tracing::debug!(
            entity = %descriptor.name(),
            key = %prepared.tuple.pk,
            signing_key = ?prepared.signature.as_ref().map(|m| m.key.value()),
            encryption_key = ?prepared.encryption_key.map(|k| k.value()),
            "tuple inserted"
        );
        Ok(prepared.plaintext)
    }

    /// Replace an existing row with an untyped payload. Always re-signs
    /// with the latest form and current key.
    pub async fn update_tuple<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        entity: &str,
        payload: Payload,
    ) -> Result<Payload, MapperError> {
        let descriptor = self.descriptor(entity)?;
        let keys = self.keys();
        let prepared = prepare(descriptor, &keys, payload, WriteMode::Update)?;
        let found = exec
            .update(descriptor.table(), &prepared.tuple)
            .await
            .map_err(MapperError::store(descriptor.name(), "update"))?;
        if !found {
            return Err(MapperError::NotFound {
                entity: descriptor.name().clone(),
                key: prepared.tuple.pk.to_string(),
            });
        }
        tracing::debug!(entity = %descriptor.name(), key = %prepared.tuple.pk, "tuple updated");
        Ok(prepared.plaintext)
    }

    /// Load a verified row by primary key.
    pub async fn get_tuple<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        entity: &str,
        pk: &PrimaryKey,
        options: LoadOptions,
    ) -> Result<Payload, MapperError> {
        let descriptor = self.descriptor(entity)?;
        let keys = self.keys();
        let not_found = || MapperError::NotFound {
            entity: descriptor.name().clone(),
            key: pk.to_string(),
        };
        let tuple = exec
            .fetch_one(descriptor.table(), pk)
            .await
            .map_err(MapperError::store(descriptor.name(), "select"))?
            .ok_or_else(not_found)?;
        self.load(descriptor, &keys, tuple, options, "get")?
            .ok_or_else(not_found)
    }

    /// Load the first row matching `query`, in primary-key order. Only that
    /// row is considered: if it fails verification the result is `NotFound`.
    pub async fn find_tuple<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        entity: &str,
        query: &Query,
        options: LoadOptions,
    ) -> Result<Payload, MapperError> {
        let descriptor = self.descriptor(entity)?;
        query.validate(descriptor)?;
        let keys = self.keys();
        let not_found = || MapperError::NotFound {
            entity: descriptor.name().clone(),
            key: query.to_string(),
        };
        let tuple = exec
            .fetch_all(descriptor.table(), query)
            .await
            .map_err(MapperError::store(descriptor.name(), "select"))?
            .into_iter()
            .next()
            .ok_or_else(not_found)?;
        self.load(descriptor, &keys, tuple, options, "get")?
            .ok_or_else(not_found)
    }

    /// Load every row matching `query`. Rows failing verification are
    /// dropped and reported in [`Listing::dropped`].
    ///
    /// With decryption enabled, a row that verifies but cannot be
    /// decrypted fails the whole call.
    pub async fn get_all_tuples<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        entity: &str,
        query: &Query,
        options: LoadOptions,
    ) -> Result<Listing<Payload>, MapperError> {
        let descriptor = self.descriptor(entity)?;
        query.validate(descriptor)?;
        let keys = self.keys();
        let rows = exec
            .fetch_all(descriptor.table(), query)
            .await
            .map_err(MapperError::store(descriptor.name(), "select"))?;

        let mut listing = Listing {
            items: Vec::with_capacity(rows.len()),
            dropped: Vec::new(),
        };
        for tuple in rows {
            let pk = tuple.pk.clone();
            match self.load(descriptor, &keys, tuple, options, "get_all")? {
                Some(payload) => listing.items.push(payload),
                None => listing.dropped.push(pk),
            }
        }
        // Each drop was already logged at error level by `quarantine`; that
        // per-row event is the corruption record. This is a summary only.
        if !listing.dropped.is_empty() {
            tracing::warn!(
                entity = %descriptor.name(),
                dropped = listing.dropped.len(),
                returned = listing.items.len(),
                "listing dropped unverifiable tuples"
            );
        }
        Ok(listing)
    }

    /// Delete a row by primary key.
    pub async fn delete_tuple<E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        entity: &str,
        pk: &PrimaryKey,
    ) -> Result<(), MapperError> {
        let descriptor = self.descriptor(entity)?;
        let found = exec
            .delete(descriptor.table(), pk)
            .await
            .map_err(MapperError::store(descriptor.name(), "delete"))?;
        if !found {
            return Err(MapperError::NotFound {
                entity: descriptor.name().clone(),
                key: pk.to_string(),
            });
        }
        tracing::debug!(entity = %descriptor.name(), key = %pk, "tuple deleted");
        Ok(())
    }

    /// Insert a domain value. On success `value` holds the assigned
    /// identifier and modification time; sealed fields stay in clear.
    pub async fn insert<T: Entity, E: Executor + ?Sized>(&self, exec: &mut E, value: &mut T) -> Result<(), MapperError> {
        let written = self.insert_tuple(exec, T::ENTITY, to_payload(value)?).await?;
        *value = from_payload(written)?;
        Ok(())
    }

    /// Update a domain value. On success `value` holds the new
    /// modification time.
    pub async fn update<T: Entity, E: Executor + ?Sized>(&self, exec: &mut E, value: &mut T) -> Result<(), MapperError> {
        let written = self.update_tuple(exec, T::ENTITY, to_payload(value)?).await?;
        *value = from_payload(written)?;
        Ok(())
    }

    /// Load a domain value by primary key.
    pub async fn get<T: Entity, E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        pk: &PrimaryKey,
        options: LoadOptions,
    ) -> Result<T, MapperError> {
        from_payload(self.get_tuple(exec, T::ENTITY, pk, options).await?)
    }

    /// Load the first domain value matching `query`.
    pub async fn get_by_query<T: Entity, E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        query: &Query,
        options: LoadOptions,
    ) -> Result<T, MapperError> {
        from_payload(self.find_tuple(exec, T::ENTITY, query, options).await?)
    }

    /// Load every domain value matching `query`.
    pub async fn get_all<T: Entity, E: Executor + ?Sized>(
        &self,
        exec: &mut E,
        query: &Query,
        options: LoadOptions,
    ) -> Result<Listing<T>, MapperError> {
        let listing = self.get_all_tuples(exec, T::ENTITY, query, options).await?;
        Ok(Listing {
            items: listing
                .items
                .into_iter()
                .map(from_payload)
                .collect::<Result<Vec<T>, _>>()?,
            dropped: listing.dropped,
        })
    }

    /// Delete a domain value by primary key.
    pub async fn delete<T: Entity, E: Executor + ?Sized>(&self, exec: &mut E, pk: &PrimaryKey) -> Result<(), MapperError> {
        self.delete_tuple(exec, T::ENTITY, pk).await
    }
}
