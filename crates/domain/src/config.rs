//! Configuration management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{AuditVaultError, Result};
use crate::types::{KeyType, RotationPolicy};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub key_provider: KeyProviderConfig,
    pub rotation: RotationConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reject settings that would weaken key derivation or make rotation
    /// bookkeeping meaningless.
    pub fn validate(&self) -> Result<()> {
        self.key_provider.validate()?;
        self.rotation.validate()
    }
}

/// Key acquisition chain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyProviderConfig {
    /// Absent means the HSM tier is skipped.
    pub hsm: Option<HsmConfig>,
    pub cache_ttl_secs: u64,
    /// Env var holding the hex master secret for the software tier.
    pub master_secret_env: String,
    pub master_secret_path: Option<PathBuf>,
    pub wrapped_key_path: Option<PathBuf>,
    pub pbkdf2_iterations: u32,
}

impl Default for KeyProviderConfig {
    fn default() -> Self {
        Self {
            hsm: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            master_secret_env: DEFAULT_MASTER_SECRET_ENV.to_string(),
            master_secret_path: None,
            wrapped_key_path: None,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl KeyProviderConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(AuditVaultError::Misconfigured(
                "key_provider.cache_ttl_secs must be greater than zero".into(),
            ));
        }
        if self.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(AuditVaultError::Misconfigured(format!(
                "key_provider.pbkdf2_iterations must be at least {MIN_PBKDF2_ITERATIONS}, got {}",
                self.pbkdf2_iterations
            )));
        }
        if let Some(hsm) = &self.hsm {
            hsm.validate()?;
        }
        Ok(())
    }
}

/// Remote HSM connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HsmConfig {
    pub base_url: String,
    #[serde(default = "default_hsm_key_name")]
    pub key_name: String,
    /// Env var holding the bearer token; the token itself is never stored
    /// in configuration.
    #[serde(default = "default_hsm_token_env")]
    pub token_env: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
}

fn default_hsm_key_name() -> String {
    DEFAULT_HSM_KEY_NAME.to_string()
}

fn default_hsm_token_env() -> String {
    DEFAULT_HSM_TOKEN_ENV.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_HSM_CONNECT_TIMEOUT_SECS
}

fn default_op_timeout_secs() -> u64 {
    DEFAULT_HSM_OP_TIMEOUT_SECS
}

impl HsmConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            key_name: default_hsm_key_name(),
            token_env: default_hsm_token_env(),
            connect_timeout_secs: DEFAULT_HSM_CONNECT_TIMEOUT_SECS,
            op_timeout_secs: DEFAULT_HSM_OP_TIMEOUT_SECS,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_secs(self.op_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(AuditVaultError::Misconfigured("key_provider.hsm.base_url is empty".into()));
        }
        if self.key_name.trim().is_empty() {
            return Err(AuditVaultError::Misconfigured("key_provider.hsm.key_name is empty".into()));
        }
        if self.connect_timeout_secs == 0 || self.op_timeout_secs == 0 {
            return Err(AuditVaultError::Misconfigured(
                "key_provider.hsm timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Secret rotation settings
///
/// Relative paths resolve against `project_root`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub project_root: PathBuf,
    pub secret_store_path: PathBuf,
    pub history_path: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_password_env: String,
    pub lock_path: PathBuf,
    pub history_report_limit: usize,
    pub policies: RotationPolicies,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            secret_store_path: PathBuf::from(DEFAULT_SECRET_STORE_PATH),
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            backup_password_env: DEFAULT_BACKUP_PASSWORD_ENV.to_string(),
            lock_path: PathBuf::from(DEFAULT_LOCK_PATH),
            history_report_limit: DEFAULT_HISTORY_REPORT_LIMIT,
            policies: RotationPolicies::default(),
        }
    }
}

impl RotationConfig {
    /// Rooted at `project_root` with every other setting defaulted.
    pub fn rooted_at(project_root: impl Into<PathBuf>) -> Self {
        Self { project_root: project_root.into(), ..Self::default() }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn secret_store_file(&self) -> PathBuf {
        self.resolve(&self.secret_store_path)
    }

    pub fn history_file(&self) -> PathBuf {
        self.resolve(&self.history_path)
    }

    pub fn backup_directory(&self) -> PathBuf {
        self.resolve(&self.backup_dir)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.resolve(&self.lock_path)
    }

    pub fn validate(&self) -> Result<()> {
        for key_type in KeyType::ALL {
            let policy = self.policies.get(key_type);
            if policy.rotation_interval_days == 0 {
                return Err(AuditVaultError::Misconfigured(format!(
                    "rotation.policies.{key_type}.rotation_interval_days must be greater than zero"
                )));
            }
            if policy.retained_versions == 0 {
                return Err(AuditVaultError::Misconfigured(format!(
                    "rotation.policies.{key_type}.retained_versions must be greater than zero"
                )));
            }
            if policy.key_length < MIN_KEY_LENGTH {
                return Err(AuditVaultError::Misconfigured(format!(
                    "rotation.policies.{key_type}.key_length must be at least {MIN_KEY_LENGTH}"
                )));
            }
        }
        Ok(())
    }
}

/// Per key type rotation policy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicies {
    pub jwt_secret: RotationPolicy,
    pub session_secret: RotationPolicy,
    pub csrf_secret: RotationPolicy,
    pub encryption_key: RotationPolicy,
}

impl Default for RotationPolicies {
    fn default() -> Self {
        Self {
            jwt_secret: RotationPolicy::default_for(KeyType::JwtSecret),
            session_secret: RotationPolicy::default_for(KeyType::SessionSecret),
            csrf_secret: RotationPolicy::default_for(KeyType::CsrfSecret),
            encryption_key: RotationPolicy::default_for(KeyType::EncryptionKey),
        }
    }
}

impl RotationPolicies {
    pub fn get(&self, key_type: KeyType) -> &RotationPolicy {
        match key_type {
            KeyType::JwtSecret => &self.jwt_secret,
            KeyType::SessionSecret => &self.session_secret,
            KeyType::CsrfSecret => &self.csrf_secret,
            KeyType::EncryptionKey => &self.encryption_key,
        }
    }

    pub fn get_mut(&mut self, key_type: KeyType) -> &mut RotationPolicy {
        match key_type {
            KeyType::JwtSecret => &mut self.jwt_secret,
            KeyType::SessionSecret => &mut self.session_secret,
            KeyType::CsrfSecret => &mut self.csrf_secret,
            KeyType::EncryptionKey => &mut self.encryption_key,
        }
    }
}

/// Crypto instrumentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub slow_operation_threshold_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { slow_operation_threshold_ms: DEFAULT_SLOW_OPERATION_THRESHOLD_MS }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

crate::impl_domain_status_conversions!(LogFormat {
    Pretty => "pretty",
    Json => "json",
});

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}
