//! # rowseal-cli — Operator Tooling
//!
//! Subcommand implementations for the `rowseal` binary. Each `run_*`
//! function writes its report to the given sink and returns the process
//! exit code, so the commands can be driven from tests.

pub mod entities;
pub mod keys;
