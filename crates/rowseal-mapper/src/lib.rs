//! # rowseal-mapper — Signed and Sealed Persistence
//!
//! Every row written through the mapper carries a keyed MAC over a
//! canonical rendering of its fields, and designated fields are encrypted
//! with an independently rotating key. Reads verify before returning
//! anything; a row that does not verify is treated as absent.
//!
//! ## Components
//!
//! - [`registry`]: entity descriptors, registered once at startup.
//! - [`form`]: canonical pre-images of stored payloads.
//! - [`signature`]: signing with the latest form, verification against
//!   every form and key.
//! - [`dao`]: insert, update, get, get_all and delete pipelines.
//! - [`roll`]: re-sign and re-encrypt rows under the current keys.
//! - [`admin`]: introspection for key rotation.
//! - [`manifest`]: YAML registry descriptions for hosting processes.
//! - [`store`]: the storage contract with in-memory and PostgreSQL
//!   backends.
//!
//! ## Crate Policy
//!
//! - The registry is an explicit value injected into the [`Mapper`]; there
//!   is no global state.
//! - Decryption only happens on request and only after verification.
//! - Cryptographic error detail is logged at debug level, never returned.

pub mod admin;
pub mod dao;
pub mod descriptor;
mod encryption;
pub mod entity;
pub mod error;
pub mod form;
pub mod manifest;
pub mod mapper;
pub mod query;
pub mod registry;
pub mod roll;
pub mod sealed;
pub mod signature;
pub mod store;
pub mod tuple;

pub use admin::{EntitySummary, FormSummary, SignatureGroup, SignatureSummary, TupleFilter, TupleInfo};
pub use descriptor::{CanonicalForm, DescriptorBuilder, EncryptedField, EntityDescriptor, FieldKind, FieldSpec, IdStrategy};
pub use entity::Entity;
pub use error::{MapperError, RegistryError, StoreError};
pub use manifest::{EncryptedFieldManifest, EntityManifest, RegistryManifest};
pub use mapper::Mapper;
pub use query::Query;
pub use registry::{Registry, RegistryBuilder};
pub use roll::{BatchReport, RollReport};
pub use sealed::{Sealed, REDACTION_PLACEHOLDER};
pub use store::{Database, Executor, MemoryDatabase, PgDatabase, Transaction};
pub use tuple::{Authenticity, Listing, LoadOptions, Payload, SignatureMatch, Tuple};
pub use dao::primary_key;
pub use form::preimage;
pub use signature::verify_tuple;
