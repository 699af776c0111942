//! `auditvault` operator CLI.
//!
//! - `auditvault rotate <jwt|session|csrf|encryption|all>` - rotate secrets
//! - `auditvault schedule` - list key types due for rotation
//! - `auditvault verify` - check every stored secret against its policy
//! - `auditvault report` - schedule, integrity and recent history together
//!
//! Results go to stdout, logs to stderr. Secret values are never printed.

#![forbid(unsafe_code)]
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use auditvault_infra::{config, init_tracing, AppContext};
use clap::{Parser, Subcommand};

/// Audit-log key management CLI.
#[derive(Parser, Debug)]
#[command(name = "auditvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON). Defaults to `AUDITVAULT_CONFIG`,
    /// then the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory the secret store, history and backups resolve against.
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Output JSON instead of human-readable text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rotate one key type, or every key type after an encrypted backup.
    ///
    /// Single key types are recorded as manual rotations.
    Rotate(commands::RotateArgs),

    /// List key types that are overdue or were never rotated.
    Schedule,

    /// Check that every stored secret decodes and meets its length policy.
    ///
    /// Exits non-zero if any key type fails.
    Verify,

    /// Print the full rotation report.
    Report,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(project_root) = cli.project_root {
        config.rotation.project_root = project_root;
    }

    init_tracing(&config.logging).context("failed to initialize logging")?;

    let ctx = AppContext::build(config).context("failed to initialize services")?;
    let format = output::Format::from_json_flag(cli.json);

    match cli.command {
        Commands::Rotate(args) => commands::rotate(&ctx, &args, format).await,
        Commands::Schedule => commands::schedule(&ctx, format).await,
        Commands::Verify => commands::verify(&ctx, format).await,
        Commands::Report => commands::report(&ctx, format).await,
    }
}
