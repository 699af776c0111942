//! Port interfaces for key acquisition
//!
//! These traits define the boundaries between the key provider and the
//! HSM, TPM and storage adapters that back each tier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auditvault_domain::{KeySource, Result};
use tracing::warn;
use zeroize::Zeroizing;

use super::tier::TierError;

/// Algorithm used to wrap the data key inside the HSM.
pub const WRAP_ALGORITHM: &str = "RSA-OAEP-256";

/// A key known to the HSM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsmKeyHandle {
    pub name: String,
    pub version: Option<String>,
}

/// Opens sessions against a remote HSM.
#[async_trait]
pub trait HsmConnector: Send + Sync {
    /// Establish a session, giving up after `timeout`.
    async fn connect(&self, timeout: Duration) -> std::result::Result<Arc<dyn HsmClient>, TierError>;
}

/// An established HSM session.
#[async_trait]
pub trait HsmClient: Send + Sync {
    async fn list_keys(&self) -> std::result::Result<Vec<String>, TierError>;

    async fn get_key(&self, name: &str) -> std::result::Result<HsmKeyHandle, TierError>;

    async fn encrypt(
        &self,
        key: &HsmKeyHandle,
        algorithm: &str,
        plaintext: &[u8],
    ) -> std::result::Result<Vec<u8>, TierError>;

    async fn decrypt(
        &self,
        key: &HsmKeyHandle,
        algorithm: &str,
        ciphertext: &[u8],
    ) -> std::result::Result<Zeroizing<Vec<u8>>, TierError>;
}

/// TPM hierarchy under which the primary key is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmHierarchy {
    Owner,
    Endorsement,
    Platform,
}

/// Handle of a loaded TPM object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpmHandle(pub u32);

/// Local TPM with a sealed key object.
///
/// Calls are blocking and run on the blocking thread pool.
pub trait TpmDevice: Send + Sync {
    fn create_primary(
        &self,
        hierarchy: TpmHierarchy,
        algorithm: &str,
    ) -> std::result::Result<TpmHandle, TierError>;

    fn unseal(&self, handle: TpmHandle) -> std::result::Result<Zeroizing<Vec<u8>>, TierError>;
}

/// Persistence for the HSM-wrapped data key.
#[async_trait]
pub trait WrappedKeyStore: Send + Sync {
    async fn load(&self, key_name: &str) -> Result<Option<Vec<u8>>>;

    async fn store(&self, key_name: &str, wrapped: &[u8]) -> Result<()>;
}

/// Master secret and salt feeding the software tier.
pub struct MasterSecret {
    pub secret: Zeroizing<Vec<u8>>,
    pub salt: Vec<u8>,
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret")
            .field("secret", &"[REDACTED]")
            .field("salt_len", &self.salt.len())
            .finish()
    }
}

/// Source of the software tier's master secret.
#[async_trait]
pub trait MasterSecretStore: Send + Sync {
    /// Return the master secret and its salt, generating and persisting both
    /// on first use.
    async fn load_or_provision(&self) -> Result<MasterSecret>;
}

/// An acquisition that was served by a tier other than the HSM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEvent {
    pub source: KeySource,
    /// Why the preferred tiers were skipped, one clause per tier.
    pub reason: String,
}

/// Receives key acquisition events.
pub trait KeyEventSink: Send + Sync {
    fn fallback_activated(&self, event: &FallbackEvent);
}

/// Logs fallback events at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingKeyEventSink;

impl KeyEventSink for TracingKeyEventSink {
    fn fallback_activated(&self, event: &FallbackEvent) {
        warn!(source = event.source.as_str(), reason = %event.reason, "key_provider.fallback_activated");
    }
}
