//! # Rolling Key Sets
//!
//! A rolling key set is a timestamp-ordered collection of keys. The entry
//! with the highest timestamp is current and is the only one used to
//! produce new signatures or ciphertexts; the others stay available so
//! rows written before a rotation keep verifying and decrypting.
//!
//! ## Invariants
//!
//! - A set is never empty.
//! - Timestamps are unique within a set; in particular exactly one entry
//!   holds the maximum. Violations are rejected at construction, never
//!   resolved at runtime.
//! - A set is immutable once built. Reloading configuration builds a new
//!   set.

use std::sync::Arc;

use rowseal_core::KeyTimestamp;

use crate::error::KeyringError;
use crate::secret::SecretBytes;

/// One key of a rolling set: timestamp, algorithm and secret material.
pub struct KeyEntry<A: ?Sized> {
    timestamp: KeyTimestamp,
    algorithm: Arc<A>,
    secret: SecretBytes,
}

impl<A: ?Sized> KeyEntry<A> {
    /// Create an entry.
    pub fn new(timestamp: KeyTimestamp, algorithm: Arc<A>, secret: SecretBytes) -> Self {
        Self {
            timestamp,
            algorithm,
            secret,
        }
    }

    /// Timestamp identifying this key.
    pub fn timestamp(&self) -> KeyTimestamp {
        self.timestamp
    }

    /// Algorithm bound to this key.
    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// Raw secret material.
    pub fn secret(&self) -> &SecretBytes {
        &self.secret
    }
}

impl<A: ?Sized> Clone for KeyEntry<A> {
    fn clone(&self) -> Self {
        Self {
            timestamp: self.timestamp,
            algorithm: Arc::clone(&self.algorithm),
            secret: self.secret.clone(),
        }
    }
}

impl<A: ?Sized + std::fmt::Debug> std::fmt::Debug for KeyEntry<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEntry")
            .field("timestamp", &self.timestamp)
            .field("algorithm", &self.algorithm)
            .field("secret", &self.secret)
            .finish()
    }
}

/// Timestamp-ordered key collection with a single current key.
pub struct RollingKeySet<A: ?Sized> {
    name: &'static str,
    current: KeyEntry<A>,
    /// Older keys, newest first.
    retired: Vec<KeyEntry<A>>,
}

impl<A: ?Sized> RollingKeySet<A> {
    /// Build a set from unordered entries.
    ///
    /// `name` labels the set in error messages (`signature`, `encryption`).
    pub fn new(name: &'static str, mut entries: Vec<KeyEntry<A>>) -> Result<Self, KeyringError> {
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        for pair in entries.windows(2) {
            if pair[0].timestamp == pair[1].timestamp {
                let timestamp = pair[0].timestamp.value();
                return Err(if Some(pair[0].timestamp) == entries.first().map(|e| e.timestamp) {
                    KeyringError::AmbiguousCurrent { set: name, timestamp }
                } else {
                    KeyringError::DuplicateTimestamp { set: name, timestamp }
                });
            }
        }

        let mut entries = entries.into_iter();
        let current = entries.next().ok_or(KeyringError::Empty { set: name })?;
        Ok(Self {
            name,
            current,
            retired: entries.collect(),
        })
    }

    /// Label of this set.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The key used for every new write.
    pub fn current(&self) -> &KeyEntry<A> {
        &self.current
    }

    /// Every key, current first, then retired keys newest first.
    pub fn iter(&self) -> impl Iterator<Item = &KeyEntry<A>> {
        std::iter::once(&self.current).chain(self.retired.iter())
    }

    /// Timestamps of every key, current first.
    pub fn timestamps(&self) -> Vec<KeyTimestamp> {
        self.iter().map(KeyEntry::timestamp).collect()
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        1 + self.retired.len()
    }

    /// Always false: a set holds at least its current key.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Find a key by timestamp.
    pub fn get(&self, timestamp: KeyTimestamp) -> Option<&KeyEntry<A>> {
        self.iter().find(|e| e.timestamp == timestamp)
    }
}

impl<A: ?Sized> Clone for RollingKeySet<A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            current: self.current.clone(),
            retired: self.retired.clone(),
        }
    }
}

impl<A: ?Sized + std::fmt::Debug> std::fmt::Debug for RollingKeySet<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingKeySet")
            .field("name", &self.name)
            .field("current", &self.current.timestamp)
            .field("retired", &self.retired.iter().map(|e| e.timestamp).collect::<Vec<_>>())
            .finish()
    }
}
