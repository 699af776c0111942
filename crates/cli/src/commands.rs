//! Subcommand implementations

use std::process::ExitCode;
use std::str::FromStr;

use auditvault_domain::{KeyType, RotationReason};
use auditvault_infra::AppContext;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::output::{self, Format};

/// What `rotate` acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateTarget {
    One(KeyType),
    All,
}

impl FromStr for RotateTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        KeyType::from_str(s)
            .map(Self::One)
            .map_err(|_| format!("expected one of jwt, session, csrf, encryption, all; got '{s}'"))
    }
}

#[derive(Args, Debug)]
pub struct RotateArgs {
    /// `jwt`, `session`, `csrf`, `encryption`, or `all`.
    #[arg(value_parser = RotateTarget::from_str)]
    pub target: RotateTarget,
}

/// Rotate under the cross-process lock. Ctrl-C during `all` stops before the
/// next key type; the one in progress still completes.
pub async fn rotate(ctx: &AppContext, args: &RotateArgs, format: Format) -> anyhow::Result<ExitCode> {
    let _lock = ctx.lock_rotation()?;

    match args.target {
        RotateTarget::One(key_type) => {
            let result = ctx.rotation.rotate_with_reason(key_type, RotationReason::Manual).await?;
            output::rotation_result(&result, format)?;
            Ok(ExitCode::SUCCESS)
        }
        RotateTarget::All => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("cli.interrupt_received");
                    on_interrupt.cancel();
                }
            });

            let batch = ctx.rotation.rotate_all_with_cancel(&cancel).await;
            watcher.abort();
            let batch = batch?;

            output::rotation_batch(&batch, format)?;
            if batch.ensure_complete().is_err() || batch.was_cancelled() {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

pub async fn schedule(ctx: &AppContext, format: Format) -> anyhow::Result<ExitCode> {
    let items = ctx.rotation.check_schedule().await?;
    output::schedule(&items, format)?;
    Ok(ExitCode::SUCCESS)
}

pub async fn verify(ctx: &AppContext, format: Format) -> anyhow::Result<ExitCode> {
    let integrity = ctx.rotation.verify_integrity().await?;
    output::integrity(&integrity, format)?;

    if integrity.values().all(|valid| *valid) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

pub async fn report(ctx: &AppContext, format: Format) -> anyhow::Result<ExitCode> {
    let report = ctx.rotation.generate_report().await?;
    output::report(&report, format)?;
    Ok(ExitCode::SUCCESS)
}
