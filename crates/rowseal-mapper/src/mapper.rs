//! # Mapper
//!
//! The [`Mapper`] ties the immutable [`Registry`] to the current
//! [`KeySnapshot`]. Every operation clones the snapshot `Arc` once and
//! uses that consistent view throughout, so a concurrent
//! [`Mapper::reload_keys`] never changes keys halfway through a write.

use std::sync::Arc;

use parking_lot::RwLock;
use rowseal_crypto::{KeySnapshot, KeyringError, Sealer, Signer};

use crate::descriptor::EntityDescriptor;
use crate::error::MapperError;
use crate::registry::Registry;

/// Entry point for DAO, roll and admin operations.
#[derive(Debug)]
pub struct Mapper {
    registry: Arc<Registry>,
    keys: RwLock<Arc<KeySnapshot>>,
}

impl Mapper {
    /// Create a mapper. Fails if a registered entity needs a key set the
    /// snapshot does not provide.
    pub fn new(registry: Arc<Registry>, keys: KeySnapshot) -> Result<Self, MapperError> {
        check_keys(&registry, &keys)?;
        Ok(Self {
            registry,
            keys: RwLock::new(Arc::new(keys)),
        })
    }

    /// The entity registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The current key snapshot.
    pub fn keys(&self) -> Arc<KeySnapshot> {
        Arc::clone(&self.keys.read())
    }

    /// Swap in a new key snapshot. In-flight operations keep the old one.
    pub fn reload_keys(&self, keys: KeySnapshot) -> Result<(), MapperError> {
        check_keys(&self.registry, &keys)?;
        *self.keys.write() = Arc::new(keys);
        tracing::info!("key snapshot reloaded");
        Ok(())
    }

    /// Look up a registered descriptor.
    pub fn descriptor(&self, entity: &str) -> Result<&EntityDescriptor, MapperError> {
        self.registry
            .lookup(entity)
            .ok_or_else(|| MapperError::UnknownEntity(entity.to_string()))
    }
}

fn check_keys(registry: &Registry, keys: &KeySnapshot) -> Result<(), KeyringError> {
    if keys.signer().is_none() {
        if let Some(d) = registry.first_signed() {
            return Err(KeyringError::Missing {
                set: "signature",
                reason: format!("entity {} is signed", d.name()),
            });
        }
    }
    if keys.sealer().is_none() {
        if let Some(d) = registry.first_encrypted() {
            return Err(KeyringError::Missing {
                set: "encryption",
                reason: format!("entity {} has encrypted fields", d.name()),
            });
        }
    }
    Ok(())
}

pub(crate) fn require_signer<'a>(
    keys: &'a KeySnapshot,
    descriptor: &EntityDescriptor,
) -> Result<Option<&'a Signer>, MapperError> {
    if !descriptor.is_signed() {
        return Ok(None);
    }
    keys.signer().map(Some).ok_or_else(|| {
        KeyringError::Missing {
            set: "signature",
            reason: format!("entity {} is signed", descriptor.name()),
        }
        .into()
    })
}

pub(crate) fn require_sealer<'a>(
    keys: &'a KeySnapshot,
    descriptor: &EntityDescriptor,
) -> Result<Option<&'a Sealer>, MapperError> {
    if !descriptor.is_encrypted() {
        return Ok(None);
    }
    keys.sealer().map(Some).ok_or_else(|| {
        KeyringError::Missing {
            set: "encryption",
            reason: format!("entity {} has encrypted fields", descriptor.name()),
        }
        .into()
    })
}
