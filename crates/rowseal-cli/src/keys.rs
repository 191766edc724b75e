//! # Key Subcommands
//!
//! `keygen` prints a fresh keyring entry sized for the chosen cipher;
//! `check-keys` loads a keyring file and reports the current and retired
//! key of each set.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use rowseal_core::Timestamp;
use rowseal_crypto::{CipherSuite, KeyEntryConfig, KeyringConfig, RollingKeySet, SecretBytes};

/// Arguments for `rowseal keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Algorithm name, e.g. hmac-sha256 or aes-256-gcm.
    #[arg(long)]
    pub cipher: String,
    /// Key timestamp. Defaults to the current Unix time.
    #[arg(long)]
    pub timestamp: Option<i64>,
}

/// Arguments for `rowseal check-keys`.
#[derive(Args, Debug)]
pub struct CheckKeysArgs {
    /// Keyring YAML file.
    #[arg(value_name = "FILE")]
    pub path: PathBuf,
}

/// Which keyring list an entry belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySet {
    Signature,
    Encryption,
}

impl KeySet {
    /// YAML list name.
    pub fn list_name(self) -> &'static str {
        match self {
            Self::Signature => "signature_keys",
            Self::Encryption => "encryption_keys",
        }
    }
}

/// Generate a random entry for `cipher`.
pub fn generate_entry(suite: &CipherSuite, cipher: &str, timestamp: i64) -> Result<(KeySet, KeyEntryConfig)> {
    let (set, len) = if let Some(mac) = suite.mac(cipher) {
        (KeySet::Signature, mac.min_key_len())
    } else if let Some(aead) = suite.aead(cipher) {
        (KeySet::Encryption, aead.key_len())
    } else {
        let known: Vec<&str> = suite.mac_names().chain(suite.aead_names()).collect();
        bail!("unknown cipher {cipher:?}; expected one of: {}", known.join(", "));
    };
    let entry = KeyEntryConfig {
        timestamp: Some(timestamp),
        cipher: cipher.to_string(),
        key: SecretBytes::random(len).to_hex(),
    };
    Ok((set, entry))
}

/// Execute `rowseal keygen`.
pub fn run_keygen(args: &KeygenArgs, out: &mut dyn Write) -> Result<u8> {
    let timestamp = args.timestamp.unwrap_or_else(|| Timestamp::now().epoch_secs());
    let (set, entry) = generate_entry(&CipherSuite::default(), &args.cipher, timestamp)?;
    let yaml = serde_yaml::to_string(&vec![entry]).context("failed to render key entry")?;
    writeln!(out, "# add under {}", set.list_name())?;
    out.write_all(yaml.as_bytes())?;
    Ok(0)
}

fn describe<A: ?Sized>(
    out: &mut dyn Write,
    label: &str,
    keys: Option<&RollingKeySet<A>>,
    name: impl Fn(&A) -> &'static str,
) -> Result<()> {
    let Some(keys) = keys else {
        writeln!(out, "{label} keys: not configured")?;
        return Ok(());
    };
    let current = keys.current();
    write!(
        out,
        "{label} keys: current {} ({})",
        current.timestamp(),
        name(current.algorithm())
    )?;
    let retired: Vec<String> = keys
        .iter()
        .skip(1)
        .map(|e| format!("{} ({})", e.timestamp(), name(e.algorithm())))
        .collect();
    if retired.is_empty() {
        writeln!(out)?;
    } else {
        writeln!(out, ", retired {}", retired.join(", "))?;
    }
    Ok(())
}

/// Execute `rowseal check-keys`.
pub fn run_check_keys(args: &CheckKeysArgs, out: &mut dyn Write) -> Result<u8> {
    let config = KeyringConfig::from_path(&args.path)
        .with_context(|| format!("failed to load keyring: {}", args.path.display()))?;
    let snapshot = config
        .build(&CipherSuite::default())
        .with_context(|| format!("invalid keyring: {}", args.path.display()))?;

    describe(out, "signature", snapshot.signer().map(|s| s.keys()), |a| a.name())?;
    describe(out, "encryption", snapshot.sealer().map(|s| s.keys()), |a| a.name())?;
    if snapshot.signer().is_none() && snapshot.sealer().is_none() {
        writeln!(out, "WARNING: keyring defines no keys")?;
        return Ok(2);
    }
    writeln!(out, "OK: {}", args.path.display())?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_entry_sizes_key_for_cipher() {
        let suite = CipherSuite::default();
        for (cipher, set, hex_len) in [
            ("hmac-sha256", KeySet::Signature, 64),
            ("hmac-sha512", KeySet::Signature, 128),
            ("aes-256-gcm", KeySet::Encryption, 64),
            ("aes-128-gcm", KeySet::Encryption, 32),
        ] {
            let (got, entry) = generate_entry(&suite, cipher, 5).unwrap();
            assert_eq!(got, set, "{cipher}");
            assert_eq!(entry.key.len(), hex_len, "{cipher}");
            assert_eq!(entry.timestamp, Some(5));
        }
    }

    #[test]
    fn test_unknown_cipher_lists_known_names() {
        let err = generate_entry(&CipherSuite::default(), "des", 1).unwrap_err();
        assert!(err.to_string().contains("hmac-sha256"));
    }

    #[test]
    fn test_keygen_output_parses_back() {
        let mut out = Vec::new();
        let args = KeygenArgs {
            cipher: "hmac-sha256".into(),
            timestamp: Some(300),
        };
        assert_eq!(run_keygen(&args, &mut out).unwrap(), 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# add under signature_keys"));

        let entries: Vec<KeyEntryConfig> = serde_yaml::from_str(&text).unwrap();
        let config = KeyringConfig {
            signature_keys: entries,
            encryption_keys: vec![],
        };
        let snapshot = config.build(&CipherSuite::default()).unwrap();
        assert_eq!(snapshot.signer().unwrap().current_key().value(), 300);
    }
}
