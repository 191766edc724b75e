//! # Mapper Errors
//!
//! Three layers:
//!
//! - [`RegistryError`]: a descriptor is malformed or conflicts with
//!   another. Raised while the registry is built; fatal at startup.
//! - [`StoreError`]: the storage backend failed.
//! - [`MapperError`]: what DAO, roll and admin operations return.
//!
//! A row whose signature cannot be verified surfaces as
//! [`MapperError::NotFound`], the same as a missing row. The distinction
//! only shows up in logs and the quarantine counter.

use rowseal_core::{CanonicalizationError, CoreError, EntityName, PrimaryKey};
use rowseal_crypto::KeyringError;
use thiserror::Error;

/// Descriptor validation failure.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Two descriptors share an entity name.
    #[error("entity {0:?} is already registered")]
    Duplicate(String),

    /// Two descriptors share a storage table.
    #[error("table {table:?} of {entity:?} is already used by {other:?}")]
    DuplicateTable {
        /// Entity being registered.
        entity: String,
        /// Contested table.
        table: String,
        /// Entity that owns the table.
        other: String,
    },

    /// The entity name is not a valid identifier.
    #[error("invalid entity name: {0}")]
    InvalidName(#[from] CoreError),

    /// The table name is not a plain SQL identifier.
    #[error("entity {entity:?}: table name {table:?} is not a plain SQL identifier")]
    InvalidTable {
        /// Entity name.
        entity: String,
        /// Rejected table name.
        table: String,
    },

    /// A declared field name is not a plain identifier.
    #[error("entity {entity:?}: field name {field:?} is not a plain identifier")]
    InvalidFieldName {
        /// Entity name.
        entity: String,
        /// Rejected field name.
        field: String,
    },

    /// A field is declared twice.
    #[error("entity {entity:?}: field {field:?} is declared twice")]
    DuplicateField {
        /// Entity name.
        entity: String,
        /// Repeated field.
        field: String,
    },

    /// A form, key, or encryption setting references an undeclared field.
    #[error("entity {entity:?}: {role} references undeclared field {field:?}")]
    UndeclaredField {
        /// Entity name.
        entity: String,
        /// Where the reference appears (`form`, `primary key`, ...).
        role: &'static str,
        /// Missing field.
        field: String,
    },

    /// The descriptor is internally inconsistent.
    #[error("entity {entity:?}: {reason}")]
    Inconsistent {
        /// Entity name.
        entity: String,
        /// What is wrong.
        reason: String,
    },

    /// A registry manifest could not be parsed.
    #[error("manifest parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A registry manifest could not be read.
    #[error("manifest io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backend failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A row with this primary key already exists.
    #[error("duplicate key {key} in table {table}")]
    Conflict {
        /// Table name.
        table: String,
        /// Conflicting key.
        key: PrimaryKey,
    },

    /// A stored row has an unexpected shape.
    #[error("corrupt row {key} in table {table}: {reason}")]
    Corrupt {
        /// Table name.
        table: String,
        /// Affected key.
        key: String,
        /// What is wrong.
        reason: String,
    },

    /// PostgreSQL driver error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Error returned by mapper operations.
#[derive(Error, Debug)]
pub enum MapperError {
    /// Registry misconfiguration.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Keyring misconfiguration.
    #[error(transparent)]
    Keyring(#[from] KeyringError),

    /// The entity type is not registered.
    #[error("unknown entity {0:?}")]
    UnknownEntity(String),

    /// No row, or a row whose authenticity could not be established.
    #[error("{entity} {key} not found")]
    NotFound {
        /// Entity type.
        entity: EntityName,
        /// Primary key or query description.
        key: String,
    },

    /// The row is authentic but no configured key opens a sealed field.
    #[error("{entity} {key}: field {field:?} cannot be decrypted with the configured keys")]
    DecryptionUnavailable {
        /// Entity type.
        entity: EntityName,
        /// Primary key.
        key: PrimaryKey,
        /// Sealed field.
        field: String,
    },

    /// A sealed field still holds the redaction placeholder.
    #[error("{entity}: sealed field {field:?} is redacted and cannot be written")]
    RedactedField {
        /// Entity type.
        entity: EntityName,
        /// Redacted field.
        field: String,
    },

    /// A primary-key column has no value.
    #[error("{entity}: primary key column {field:?} has no value")]
    MissingPrimaryKey {
        /// Entity type.
        entity: EntityName,
        /// Empty column.
        field: String,
    },

    /// A field value does not match its declared kind.
    #[error("{entity}: field {field:?} {reason}")]
    InvalidField {
        /// Entity type.
        entity: EntityName,
        /// Offending field.
        field: String,
        /// What is wrong.
        reason: String,
    },

    /// A query references a field that cannot be filtered on.
    #[error("{entity}: invalid query: {reason}")]
    InvalidQuery {
        /// Entity type.
        entity: EntityName,
        /// What is wrong.
        reason: String,
    },

    /// A signature-only operation was called on an unsigned entity.
    #[error("{0} is not a signed entity")]
    NotSigned(EntityName),

    /// A cryptographic primitive failed. Detail is logged, not returned.
    #[error("{entity}: {operation} failed")]
    Crypto {
        /// Entity type.
        entity: EntityName,
        /// Failed step (`sign`, `encrypt`).
        operation: &'static str,
    },

    /// Payload (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A value could not be canonicalized.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Storage failure.
    #[error("{entity}: {operation} failed: {source}")]
    Transaction {
        /// Entity type.
        entity: EntityName,
        /// Storage step (`insert`, `select`, ...).
        operation: &'static str,
        /// Backend error.
        #[source]
        source: StoreError,
    },
}

impl MapperError {
    pub(crate) fn store<'a>(entity: &'a EntityName, operation: &'static str) -> impl FnOnce(StoreError) -> Self + 'a {
        move |source| Self::Transaction {
            entity: entity.clone(),
            operation,
            source,
        }
    }
}
