//! Scenario harness for the certpick failover engine.
//!
//! Builds a scratch workspace with a certificate manifest, dummy certificate
//! files, and in-memory credentials, then drives a [`certpick_select::CertSelector`]
//! through eight labeled failover sequences. Each step asserts the offered
//! certificate, its passphrase, and the retry advice; any mismatch fails the
//! run with a non-zero exit code.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod scenarios;

use scenarios::{run_all, run_sequence, SEQUENCE_COUNT};

/// Drives the certpick failover engine through labeled scenarios.
#[derive(Parser)]
#[command(name = "certpick-harness")]
#[command(about = "Drives the certpick failover engine through labeled scenarios", long_about = None)]
struct Cli {
    /// Scenario number (1..=8); runs every scenario when omitted.
    sequence: Option<u32>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("certpick-harness: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    match cli.sequence {
        Some(sequence) => {
            anyhow::ensure!(
                (1..=SEQUENCE_COUNT).contains(&sequence),
                "sequence must be between 1 and {SEQUENCE_COUNT}"
            );
            run_sequence(sequence)
        }
        None => run_all(),
    }
}
