//! # Registry Manifest Check
//!
//! `check-entities` validates a registry manifest the same way the admin
//! API does at startup and prints what each entity type signs and seals.
//! Given a keyring as well, it also checks that every signed or sealed
//! type has keys.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use rowseal_crypto::{CipherSuite, KeyringConfig};
use rowseal_mapper::{Mapper, RegistryManifest};

/// Arguments for `rowseal check-entities`.
#[derive(Args, Debug)]
pub struct CheckEntitiesArgs {
    /// Registry manifest YAML file.
    #[arg(value_name = "FILE")]
    pub manifest: PathBuf,
    /// Keyring YAML file to check against the manifest.
    #[arg(long)]
    pub keys: Option<PathBuf>,
}

/// Execute `rowseal check-entities`.
pub fn run_check_entities(args: &CheckEntitiesArgs, out: &mut dyn Write) -> Result<u8> {
    let registry = RegistryManifest::from_path(&args.manifest)
        .and_then(|m| m.build())
        .with_context(|| format!("invalid manifest: {}", args.manifest.display()))?;

    for descriptor in registry.list() {
        writeln!(
            out,
            "{} (table {}, key {})",
            descriptor.name(),
            descriptor.table(),
            descriptor.primary_key().join("+")
        )?;
        for (index, form) in descriptor.forms().iter().enumerate() {
            let label = if index == 0 { "latest" } else { "retained" };
            writeln!(out, "  form {} [{label}]: {}", form.id().short(), form.fields().join(", "))?;
        }
        for field in descriptor.encrypted_fields() {
            writeln!(out, "  sealed {} bound to [{}]", field.name, field.extras.join(", "))?;
        }
        if !descriptor.is_signed() {
            writeln!(out, "  unsigned")?;
        }
    }

    if let Some(path) = &args.keys {
        let keys = KeyringConfig::from_path(path)
            .and_then(|c| c.build(&CipherSuite::default()))
            .with_context(|| format!("invalid keyring: {}", path.display()))?;
        Mapper::new(registry.clone(), keys)
            .with_context(|| format!("keyring {} does not cover the manifest", path.display()))?;
        writeln!(out, "keyring {} covers every entity", path.display())?;
    }

    writeln!(out, "OK: {} entity types", registry.len())?;
    Ok(0)
}
