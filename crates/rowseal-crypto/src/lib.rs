//! # rowseal-crypto — Rolling Keys, Signatures and Field Sealing
//!
//! Provides the cryptographic building blocks of the sealing layer:
//!
//! - **MAC algorithms** (`hmac-sha256`, `hmac-sha512`) used to sign the
//!   canonical form of a tuple.
//! - **AEAD algorithms** (`aes-256-gcm`, `aes-128-gcm`) used to seal
//!   sensitive fields.
//! - **Rolling key sets**: timestamp-ordered key collections where the
//!   newest entry is current and older entries remain usable for
//!   verification and decryption.
//! - **Keyring configuration** loaded from YAML into an immutable
//!   [`KeySnapshot`].
//!
//! Algorithms are resolved by name through a [`CipherSuite`]; the rest of
//! the workspace never names a primitive directly.
//!
//! ## Crate Policy
//!
//! - Depends only on `rowseal-core` internally.
//! - Signing input is always `&CanonicalBytes`.
//! - Key material lives in zeroizing buffers and is redacted from `Debug`.
//! - No mocking of primitives in tests: real HMAC, real AES-GCM.

pub mod aead;
pub mod config;
pub mod error;
pub mod keys;
pub mod mac;
pub mod sealer;
pub mod secret;
pub mod signer;
pub mod snapshot;
pub mod suite;

pub use aead::AeadAlgorithm;
pub use config::{KeyEntryConfig, KeyringConfig};
pub use error::{CryptoError, KeyringError};
pub use keys::{KeyEntry, RollingKeySet};
pub use mac::MacAlgorithm;
pub use sealer::{Opened, Sealer};
pub use secret::SecretBytes;
pub use signer::{Signature, Signer};
pub use snapshot::KeySnapshot;
pub use suite::CipherSuite;
