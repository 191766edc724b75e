//! # rowseal CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rowseal_cli::entities::{run_check_entities, CheckEntitiesArgs};
use rowseal_cli::keys::{run_check_keys, run_keygen, CheckKeysArgs, KeygenArgs};

/// rowseal operator tooling: keys and registry manifests.
#[derive(Parser, Debug)]
#[command(name = "rowseal", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a new keyring entry with random key material.
    Keygen(KeygenArgs),

    /// Validate a keyring file and list its keys.
    CheckKeys(CheckKeysArgs),

    /// Validate a registry manifest, optionally against a keyring.
    CheckEntities(CheckEntitiesArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    let result = match &cli.command {
        Commands::Keygen(args) => run_keygen(args, &mut stdout),
        Commands::CheckKeys(args) => run_check_keys(args, &mut stdout),
        Commands::CheckEntities(args) => run_check_entities(args, &mut stdout),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
