//! # rowseal-core — Foundational Types for Row Sealing
//!
//! This crate is the leaf of the rowseal workspace. It defines the
//! primitives every signed or encrypted tuple depends on: the canonical
//! byte encoding that signatures are computed over, content digests for
//! opaque values, tuple identifiers and UTC timestamps.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every signature pre-image flows through
//!    `CanonicalBytes::new()`. No raw `serde_json::to_vec()` for anything
//!    that gets signed.
//!
//! 2. **Newtype identifiers.** `EntityName`, `PrimaryKey`, `FormId` and
//!    `KeyTimestamp` are distinct types; a key timestamp cannot be passed
//!    where a primary key is expected.
//!
//! 3. **UTC-only timestamps.** `Timestamp` enforces UTC with Z suffix and
//!    seconds precision, so modification times canonicalize identically
//!    across processes.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `rowseal-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_content, sha256_digest, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, CoreError};
pub use identity::{EntityName, FormId, KeyTimestamp, PrimaryKey};
pub use temporal::Timestamp;
