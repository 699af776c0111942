//! Tracing subscriber setup
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use auditvault_domain::{AuditVaultError, LogFormat, LoggingConfig, Result};
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a subscriber is
/// already installed or the level directive does not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            AuditVaultError::Config(format!("Invalid log level '{}': {e}", config.level))
        })?,
    };

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init(),
    }
    .map_err(|e| AuditVaultError::Config(format!("Failed to initialize logging: {e}")))
}

