//! CLI probe for `certreg_core`.
//!
//! # Responsibility
//! - Verify core crate linkage (`ping`, `version`).
//! - Validate record JSON files offline, without any registry state.

use certreg_core::{validate, RecordKind};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "certreg", about = "Certificate and medical record registry tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Health check against the core crate.
    Ping,
    /// Prints the core crate version.
    Version,
    /// Validates a record JSON file against a kind's schema.
    Check {
        /// Record kind: `certificate` or `medical_record`.
        #[arg(long, value_parser = parse_kind)]
        kind: RecordKind,
        /// Path to the record JSON file.
        file: PathBuf,
    },
}

fn parse_kind(value: &str) -> Result<RecordKind, String> {
    RecordKind::parse(value)
        .ok_or_else(|| format!("unknown record kind `{value}`; expected certificate|medical_record"))
}

fn main() -> ExitCode {
    match Cli::parse().command {
        Command::Ping => {
            println!("certreg_core ping={}", certreg_core::ping());
            ExitCode::SUCCESS
        }
        Command::Version => {
            println!("certreg_core version={}", certreg_core::core_version());
            ExitCode::SUCCESS
        }
        Command::Check { kind, file } => match check(kind, &file) {
            Ok(()) => {
                println!("valid {kind} record: {}", file.display());
                ExitCode::SUCCESS
            }
            Err(message) => {
                eprintln!("invalid {kind} record: {message}");
                ExitCode::FAILURE
            }
        },
    }
}

fn check(kind: RecordKind, file: &Path) -> Result<(), String> {
    let text = std::fs::read_to_string(file)
        .map_err(|err| format!("failed to read `{}`: {err}", file.display()))?;
    let raw: serde_json::Value =
        serde_json::from_str(&text).map_err(|err| format!("not valid JSON: {err}"))?;
    validate(&raw, kind).map_err(|err| err.to_string())
}
