//! # Entity Registry
//!
//! Catalog of persisted types. Domain crates register their descriptors
//! on a [`RegistryBuilder`] during startup; [`RegistryBuilder::build`]
//! freezes the catalog into an immutable [`Registry`] that is shared by
//! `Arc` without locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use rowseal_core::EntityName;

use crate::descriptor::EntityDescriptor;
use crate::entity::Entity;
use crate::error::RegistryError;

/// Single-writer registration phase.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entities: BTreeMap<EntityName, EntityDescriptor>,
}

impl RegistryBuilder {
    /// Start an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Names and tables must be unique.
    pub fn register(&mut self, descriptor: EntityDescriptor) -> Result<&mut Self, RegistryError> {
        if self.entities.contains_key(descriptor.name()) {
            return Err(RegistryError::Duplicate(descriptor.name().to_string()));
        }
        if let Some(other) = self
            .entities
            .values()
            .find(|d| d.table() == descriptor.table())
        {
            return Err(RegistryError::DuplicateTable {
                entity: descriptor.name().to_string(),
                table: descriptor.table().to_string(),
                other: other.name().to_string(),
            });
        }
        tracing::debug!(
            entity = %descriptor.name(),
            table = descriptor.table(),
            forms = descriptor.forms().len(),
            encrypted_fields = descriptor.encrypted_fields().len(),
            "entity registered"
        );
        self.entities.insert(descriptor.name().clone(), descriptor);
        Ok(self)
    }

    /// Register the descriptor of a domain type.
    pub fn register_entity<T: Entity>(&mut self) -> Result<&mut Self, RegistryError> {
        let descriptor = T::descriptor()?;
        if descriptor.name().as_str() != T::ENTITY {
            return Err(RegistryError::Inconsistent {
                entity: T::ENTITY.to_string(),
                reason: format!("descriptor is named {:?}", descriptor.name().as_str()),
            });
        }
        self.register(descriptor)
    }

    /// Freeze the catalog.
    pub fn build(self) -> Arc<Registry> {
        Arc::new(Registry {
            entities: self.entities,
        })
    }
}

/// Immutable catalog of registered entity types.
#[derive(Debug)]
pub struct Registry {
    entities: BTreeMap<EntityName, EntityDescriptor>,
}

impl Registry {
    /// Find a descriptor by type identifier.
    pub fn lookup(&self, entity: &str) -> Option<&EntityDescriptor> {
        self.entities.values().find(|d| d.name().as_str() == entity)
    }

    /// All descriptors, ordered by name.
    pub fn list(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.values()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// First signed entity, if any.
    pub(crate) fn first_signed(&self) -> Option<&EntityDescriptor> {
        self.list().find(|d| d.is_signed())
    }

    /// First entity with sealed fields, if any.
    pub(crate) fn first_encrypted(&self) -> Option<&EntityDescriptor> {
        self.list().find(|d| d.is_encrypted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldKind;

    fn descriptor(name: &str, table: &str) -> EntityDescriptor {
        EntityDescriptor::builder(name, table)
            .field("id", FieldKind::Text)
            .primary_key(["id"])
            .form(["id"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(descriptor("b", "b_table"))
            .unwrap()
            .register(descriptor("a", "a_table"))
            .unwrap();
        let registry = builder.build();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("a").unwrap().table(), "a_table");
        assert!(registry.lookup("c").is_none());
        let names: Vec<_> = registry.list().map(|d| d.name().as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register(descriptor("a", "t1")).unwrap();
        assert!(matches!(
            builder.register(descriptor("a", "t2")),
            Err(RegistryError::Duplicate(name)) if name == "a"
        ));
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register(descriptor("a", "t")).unwrap();
        assert!(matches!(
            builder.register(descriptor("b", "t")),
            Err(RegistryError::DuplicateTable { .. })
        ));
    }

    #[test]
    fn test_signed_and_encrypted_lookup() {
        let mut builder = RegistryBuilder::new();
        builder.register(descriptor("a", "t")).unwrap();
        let registry = builder.build();
        assert!(registry.first_signed().is_some());
        assert!(registry.first_encrypted().is_none());
    }
}
