//! Conversions from external infrastructure errors into domain errors.

use auditvault_core::TierError;
use auditvault_domain::AuditVaultError;
use reqwest::{Error as HttpError, StatusCode};
use tempfile::PersistError;
use toml::de::Error as TomlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AuditVaultError);

impl From<InfraError> for AuditVaultError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AuditVaultError> for InfraError {
    fn from(value: AuditVaultError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* toml / tempfile → AuditVaultError */
/* -------------------------------------------------------------------------- */

impl From<TomlError> for InfraError {
    fn from(value: TomlError) -> Self {
        InfraError(AuditVaultError::Config(format!("Invalid TOML format: {value}")))
    }
}

impl From<PersistError> for InfraError {
    fn from(value: PersistError) -> Self {
        InfraError(AuditVaultError::Io(format!(
            "failed to replace {}: {}",
            value.file.path().display(),
            value.error
        )))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest → TierError */
/* -------------------------------------------------------------------------- */

/// Maps HSM transport failures onto the tier error the key provider falls
/// through on.
pub trait IntoTierError {
    fn into_tier_error(self) -> TierError;
}

impl IntoTierError for HttpError {
    fn into_tier_error(self) -> TierError {
        if self.is_timeout() {
            return TierError::Unavailable("HSM request timed out".into());
        }

        if self.is_connect() {
            return TierError::Unavailable("HSM connection failure".into());
        }

        if let Some(status) = self.status() {
            return status.into_tier_error();
        }

        if self.is_decode() {
            return TierError::Backend(format!("malformed HSM response: {self}"));
        }

        TierError::Unavailable(self.to_string())
    }
}

impl IntoTierError for StatusCode {
    fn into_tier_error(self) -> TierError {
        let message =
            format!("HSM returned {} {}", self.as_u16(), self.canonical_reason().unwrap_or("unknown status"));

        match self.as_u16() {
            401 | 403 => TierError::Misconfigured(message),
            404 => TierError::Unavailable(message),
            429 | 500..=599 => TierError::Unavailable(message),
            _ => TierError::Backend(message),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
