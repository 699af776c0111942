//! Error types used throughout the workspace

use std::time::Duration;

use auditvault_common::{CommonError, ErrorClassification, ErrorSeverity};
use thiserror::Error;

use crate::types::KeyType;

/// Main error type for AuditVault
#[derive(Error, Debug)]
pub enum AuditVaultError {
    /// Every key acquisition tier failed.
    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    /// An HSM call exceeded its deadline. Recovered by fallback inside the
    /// key provider; only surfaces from direct tier calls.
    #[error("Connectivity timeout: '{operation}' exceeded {timeout:?}")]
    ConnectivityTimeout { operation: String, timeout: Duration },

    /// Required policy or configuration is missing or invalid.
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    /// Authentication tag mismatch or corrupted ciphertext.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Some key types failed during a batch rotation.
    #[error("Rotation failed for: {}", join_key_types(.failed))]
    RotationPartialFailure { failed: Vec<KeyType> },

    /// A stored secret fails its length or decodability policy.
    #[error("Integrity violation for: {}", join_key_types(.key_types))]
    IntegrityViolation { key_types: Vec<KeyType> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Result type alias for AuditVault operations
pub type Result<T> = std::result::Result<T, AuditVaultError>;

fn join_key_types(types: &[KeyType]) -> String {
    types.iter().map(KeyType::as_str).collect::<Vec<_>>().join(", ")
}

impl AuditVaultError {
    /// Stable label suitable for log fields and metric tags.
    pub fn label(&self) -> &'static str {
        match self {
            Self::KeyUnavailable(_) => "key_unavailable",
            Self::ConnectivityTimeout { .. } => "connectivity_timeout",
            Self::Misconfigured(_) => "misconfigured",
            Self::Decryption(_) => "decryption",
            Self::RotationPartialFailure { .. } => "rotation_partial_failure",
            Self::IntegrityViolation { .. } => "integrity_violation",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
            Self::Common(inner) => inner.kind(),
        }
    }
}

impl ErrorClassification for AuditVaultError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectivityTimeout { .. } => true,
            Self::KeyUnavailable(_) => true,
            Self::Io(_) => true,
            Self::Common(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ConnectivityTimeout { .. } => ErrorSeverity::Warning,
            Self::NotFound(_) => ErrorSeverity::Info,
            Self::Decryption(_) | Self::IntegrityViolation { .. } | Self::Internal(_) => {
                ErrorSeverity::Critical
            }
            Self::KeyUnavailable(_) => ErrorSeverity::Critical,
            Self::Common(inner) => inner.severity(),
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ConnectivityTimeout { timeout, .. } => Some(*timeout),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AuditVaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AuditVaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
