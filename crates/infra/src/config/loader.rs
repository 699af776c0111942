//! Configuration loader
//!
//! Loads application configuration from a file, then applies environment
//! overrides.
//!
//! ## Loading Strategy
//! 1. Load `.env` from the working directory (if present) into the process
//!    environment
//! 2. Use the explicit path, else `AUDITVAULT_CONFIG`, else probe the
//!    standard locations
//! 3. Fall back to defaults when no file is found
//! 4. Apply environment overrides and validate
//!
//! ## Environment Variables
//! - `AUDITVAULT_CONFIG`: Config file path
//! - `AUDITVAULT_HSM_URL`: HSM base URL (enables the HSM tier)
//! - `AUDITVAULT_HSM_KEY_NAME` (alias `AZURE_HSM_NAME`): HSM key name
//! - `AUDITVAULT_CACHE_TTL_SECS`: Key cache TTL in seconds
//! - `AUDITVAULT_PROJECT_ROOT`: Root for relative rotation paths
//! - `AUDITVAULT_LOG_FORMAT`: `pretty` or `json`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./auditvault.toml`
//! 2. `./auditvault.json`
//! 3. `./config/auditvault.toml`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use auditvault_domain::{AppConfig, AuditVaultError, HsmConfig, LogFormat, Result};

use crate::errors::InfraError;

pub const CONFIG_PATH_ENV: &str = "AUDITVAULT_CONFIG";
pub const HSM_URL_ENV: &str = "AUDITVAULT_HSM_URL";
pub const HSM_KEY_NAME_ENV: &str = "AUDITVAULT_HSM_KEY_NAME";
pub const HSM_KEY_NAME_ALIAS_ENV: &str = "AZURE_HSM_NAME";
pub const CACHE_TTL_ENV: &str = "AUDITVAULT_CACHE_TTL_SECS";
pub const PROJECT_ROOT_ENV: &str = "AUDITVAULT_PROJECT_ROOT";
pub const LOG_FORMAT_ENV: &str = "AUDITVAULT_LOG_FORMAT";

/// Load and validate configuration.
///
/// # Errors
/// Returns `AuditVaultError::Config` if the file cannot be read or parsed or
/// an override has an invalid value, and `Misconfigured` if validation
/// fails.
pub fn load(explicit_path: Option<&Path>) -> Result<AppConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "config.dotenv_loaded"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "config.dotenv_failed"),
    }

    let path = explicit_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .or_else(probe_config_paths);

    let mut config = match path {
        Some(path) => load_from_file(&path)?,
        None => {
            tracing::info!("config.defaults_used");
            AppConfig::default()
        }
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// Format is detected by extension (`.toml` or `.json`).
///
/// # Errors
/// Returns `AuditVaultError::Config` if the file is missing, unreadable, or
/// malformed.
pub fn load_from_file(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(AuditVaultError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "config.loading_file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| AuditVaultError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AuditVaultError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(AuditVaultError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations, relative to the working directory.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    [
        cwd.join("auditvault.toml"),
        cwd.join("auditvault.json"),
        cwd.join("config").join("auditvault.toml"),
    ]
    .into_iter()
    .find(|path| path.exists())
}

/// Apply environment overrides read through `lookup`.
///
/// # Errors
/// Returns `AuditVaultError::Config` for values that do not parse.
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(url) = lookup(HSM_URL_ENV) {
        match config.key_provider.hsm.as_mut() {
            Some(hsm) => hsm.base_url = url,
            None => config.key_provider.hsm = Some(HsmConfig::new(url)),
        }
    }

    if let Some(key_name) = lookup(HSM_KEY_NAME_ENV).or_else(|| lookup(HSM_KEY_NAME_ALIAS_ENV)) {
        match config.key_provider.hsm.as_mut() {
            Some(hsm) => hsm.key_name = key_name,
            None => tracing::warn!(requires = HSM_URL_ENV, "config.hsm_key_name_ignored"),
        }
    }

    if let Some(ttl) = lookup(CACHE_TTL_ENV) {
        config.key_provider.cache_ttl_secs = ttl
            .trim()
            .parse()
            .map_err(|e| AuditVaultError::Config(format!("Invalid {CACHE_TTL_ENV}: {e}")))?;
    }

    if let Some(root) = lookup(PROJECT_ROOT_ENV) {
        config.rotation.project_root = PathBuf::from(root);
    }

    if let Some(format) = lookup(LOG_FORMAT_ENV) {
        config.logging.format = LogFormat::from_str(format.trim())
            .map_err(|e| AuditVaultError::Config(format!("Invalid {LOG_FORMAT_ENV}: {e}")))?;
    }

    Ok(())
}
