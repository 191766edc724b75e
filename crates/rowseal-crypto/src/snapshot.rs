//! # Key Snapshot
//!
//! The immutable result of loading a keyring. Either set may be absent
//! when no registered entity needs it; the mapper checks this at startup.

use crate::sealer::Sealer;
use crate::signer::Signer;

/// Immutable signature and encryption key sets from one keyring load.
#[derive(Debug, Clone, Default)]
pub struct KeySnapshot {
    signer: Option<Signer>,
    sealer: Option<Sealer>,
}

impl KeySnapshot {
    /// Assemble a snapshot from already validated key sets.
    pub fn new(signer: Option<Signer>, sealer: Option<Sealer>) -> Self {
        Self { signer, sealer }
    }

    /// Signature key set, if configured.
    pub fn signer(&self) -> Option<&Signer> {
        self.signer.as_ref()
    }

    /// Encryption key set, if configured.
    pub fn sealer(&self) -> Option<&Sealer> {
        self.sealer.as_ref()
    }
}
