//! # Key Roll
//!
//! Re-stamps stored rows with the latest form, current signing key and
//! current encryption key so that retired keys and forms can be removed
//! from configuration. Each row is rolled in its own transaction:
//!
//! 1. load the row with a write lock;
//! 2. verify it (fail closed: an unverifiable row is reported as absent);
//! 3. decrypt every sealed field with any configured key;
//! 4. re-seal, re-sign, write and commit.
//!
//! Rolling works on untyped payloads, so administrative callers do not
//! need the domain type.

use std::collections::BTreeMap;

use rowseal_core::{KeyTimestamp, PrimaryKey};
use serde::{Deserialize, Serialize};

use crate::dao::{prepare, quarantine, WriteMode};
use crate::encryption::decrypt_fields;
use crate::error::MapperError;
use crate::mapper::{require_sealer, Mapper};
use crate::signature::verify_tuple;
use crate::store::Database;
use crate::tuple::{Authenticity, SignatureMatch};

/// What rolling one row changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollReport {
    /// Rolled row.
    pub key: PrimaryKey,
    /// Signature before the roll; `None` for unsigned types.
    pub before: Option<SignatureMatch>,
    /// Signature after the roll; `None` for unsigned types.
    pub after: Option<SignatureMatch>,
    /// Key that opened each sealed field before the roll.
    pub encryption_before: BTreeMap<String, KeyTimestamp>,
    /// Key that sealed the fields after the roll.
    pub encryption_after: Option<KeyTimestamp>,
}

/// Outcome of [`Mapper::roll_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Rolled rows, in request order.
    pub rolled: Vec<RollReport>,
    /// Requested keys with no stored row (only with `ignore_missing`).
    pub skipped: Vec<PrimaryKey>,
}

impl Mapper {
    /// Roll one row. An absent or unverifiable row is `NotFound`.
    pub async fn roll(&self, db: &dyn Database, entity: &str, pk: &PrimaryKey) -> Result<RollReport, MapperError> {
        let descriptor = self.descriptor(entity)?;
        self.roll_row(db, entity, pk)
            .await?
            .ok_or_else(|| MapperError::NotFound {
                entity: descriptor.name().clone(),
                key: pk.to_string(),
            })
    }

    /// Roll several rows sequentially, stopping at the first failure.
    ///
    /// With `ignore_missing`, keys that have no stored row are reported as
    /// skipped. Rows that exist but fail verification still fail the batch.
    pub async fn roll_batch(
        &self,
        db: &dyn Database,
        entity: &str,
        keys: &[PrimaryKey],
        ignore_missing: bool,
    ) -> Result<BatchReport, MapperError> {
        let descriptor = self.descriptor(entity)?;
        let mut report = BatchReport::default();
        for pk in keys {
            match self.roll_row(db, entity, pk).await? {
                Some(rolled) => report.rolled.push(rolled),
                None if ignore_missing => {
                    tracing::warn!(entity = %descriptor.name(), key = %pk, "roll skipped missing tuple");
                    report.skipped.push(pk.clone());
                }
                None => {
                    return Err(MapperError::NotFound {
                        entity: descriptor.name().clone(),
                        key: pk.to_string(),
                    })
                }
            }
        }
        tracing::info!(
            entity = %descriptor.name(),
            rolled = report.rolled.len(),
            skipped = report.skipped.len(),
            "roll batch complete"
        );
        Ok(report)
    }

    /// `Ok(None)` means the row does not exist.
    async fn roll_row(&self, db: &dyn Database, entity: &str, pk: &PrimaryKey) -> Result<Option<RollReport>, MapperError> {
        let descriptor = self.descriptor(entity)?;
        let keys = self.keys();
        let store_err = |operation| MapperError::store(descriptor.name(), operation);

        let mut tx = db.begin().await.map_err(store_err("begin"))?;
        let Some(tuple) = tx
            .fetch_for_update(descriptor.table(), pk)
            .await
            .map_err(store_err("select"))?
        else {
            tx.rollback().await.map_err(store_err("rollback"))?;
            return Ok(None);
        };

        let before = match verify_tuple(descriptor, &tuple, keys.signer()) {
            Authenticity::Failed => {
                quarantine(descriptor, pk, "roll");
                tx.rollback().await.map_err(store_err("rollback"))?;
                return Err(MapperError::NotFound {
                    entity: descriptor.name().clone(),
                    key: pk.to_string(),
                });
            }
            Authenticity::Verified(m) => Some(m),
            Authenticity::Unsigned => None,
        };

        let mut payload = tuple.payload;
        let encryption_before = match require_sealer(&keys, descriptor)? {
            Some(sealer) => decrypt_fields(descriptor, pk, &mut payload, sealer)?,
            None => BTreeMap::new(),
        };

        let prepared = prepare(descriptor, &keys, payload, WriteMode::Roll)?;
        if &prepared.tuple.pk != pk {
            return Err(MapperError::InvalidField {
                entity: descriptor.name().clone(),
                field: descriptor.primary_key().join(","),
                reason: format!("stored key {pk} does not match payload key {}", prepared.tuple.pk),
            });
        }
        tx.update(descriptor.table(), &prepared.tuple)
            .await
            .map_err(store_err("update"))?;
        tx.commit().await.map_err(store_err("commit"))?;

        metrics::counter!("rowseal_tuples_rolled_total", "entity" => descriptor.name().to_string()).increment(1);
        tracing::info!(
            entity = %descriptor.name(),
            key = %pk,
            signing_key_before = ?before.as_ref().map(|m| m.key.value()),
            signing_key_after = ?prepared.signature.as_ref().map(|m| m.key.value()),
            "tuple rolled"
        );

        Ok(Some(RollReport {
            key: pk.clone(),
            before,
            after: prepared.signature,
            encryption_before,
            encryption_after: prepared.encryption_key,
        }))
    }
}
