//! # Cipher Suite
//!
//! Resolves algorithm names from the keyring configuration to
//! implementations. A host may register additional algorithms before the
//! keyring is built.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::aead::{Aes128GcmAlgorithm, Aes256GcmAlgorithm, AeadAlgorithm};
use crate::mac::{HmacSha256, HmacSha512, MacAlgorithm};

/// Name → algorithm registry for MACs and AEAD ciphers.
#[derive(Debug, Clone)]
pub struct CipherSuite {
    macs: BTreeMap<&'static str, Arc<dyn MacAlgorithm>>,
    aeads: BTreeMap<&'static str, Arc<dyn AeadAlgorithm>>,
}

impl CipherSuite {
    /// An empty suite with no algorithms.
    pub fn empty() -> Self {
        Self {
            macs: BTreeMap::new(),
            aeads: BTreeMap::new(),
        }
    }

    /// Register a MAC algorithm under its own name.
    pub fn with_mac(mut self, algorithm: Arc<dyn MacAlgorithm>) -> Self {
        self.macs.insert(algorithm.name(), algorithm);
        self
    }

    /// Register an AEAD algorithm under its own name.
    pub fn with_aead(mut self, algorithm: Arc<dyn AeadAlgorithm>) -> Self {
        self.aeads.insert(algorithm.name(), algorithm);
        self
    }

    /// Look up a MAC algorithm.
    pub fn mac(&self, name: &str) -> Option<Arc<dyn MacAlgorithm>> {
        self.macs.get(name).cloned()
    }

    /// Look up an AEAD algorithm.
    pub fn aead(&self, name: &str) -> Option<Arc<dyn AeadAlgorithm>> {
        self.aeads.get(name).cloned()
    }

    /// Names of the registered MAC algorithms.
    pub fn mac_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.macs.keys().copied()
    }

    /// Names of the registered AEAD algorithms.
    pub fn aead_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.aeads.keys().copied()
    }
}

impl Default for CipherSuite {
    /// HMAC-SHA-256/512 and AES-128/256-GCM.
    fn default() -> Self {
        Self::empty()
            .with_mac(Arc::new(HmacSha256))
            .with_mac(Arc::new(HmacSha512))
            .with_aead(Arc::new(Aes256GcmAlgorithm))
            .with_aead(Arc::new(Aes128GcmAlgorithm))
    }
}
