//! # Entity Trait
//!
//! Domain types opt into the mapper by implementing [`Entity`]. The trait
//! only supplies metadata; values travel through the mapper as JSON
//! payloads, so any serde-compatible struct works.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::descriptor::EntityDescriptor;
use crate::error::RegistryError;

/// A persisted domain type.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Registered type identifier. Must equal the descriptor's name.
    const ENTITY: &'static str;

    /// Build the descriptor registered for this type.
    fn descriptor() -> Result<EntityDescriptor, RegistryError>;
}
