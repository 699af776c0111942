//! The three acquisition tiers
//!
//! Each tier returns an explicit [`TierError`] instead of swallowing its
//! failure, so the provider can record why it fell through and tests can
//! drive each tier in isolation.

use std::sync::Arc;
use std::time::Duration;

use auditvault_common::crypto::random_bytes;
use auditvault_common::DerivedKeyPair;
use auditvault_domain::constants::DATA_KEY_LEN;
use auditvault_domain::{AuditVaultError, HsmConfig};
use thiserror::Error;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::ports::{
    HsmClient, HsmConnector, MasterSecretStore, TpmDevice, TpmHandle, TpmHierarchy,
    WrappedKeyStore, WRAP_ALGORITHM,
};

/// Algorithm requested when creating the TPM primary key.
pub const TPM_PRIMARY_ALGORITHM: &str = "aes256cfb";
const PRIMARY_HIERARCHY: TpmHierarchy = TpmHierarchy::Owner;

/// Why a single tier could not produce a key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierError {
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: &'static str, timeout: Duration },

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("misconfigured: {0}")]
    Misconfigured(String),
}

impl From<TierError> for AuditVaultError {
    fn from(err: TierError) -> Self {
        match err {
            TierError::Timeout { operation, timeout } => {
                AuditVaultError::ConnectivityTimeout { operation: operation.to_string(), timeout }
            }
            TierError::Misconfigured(message) => AuditVaultError::Misconfigured(message),
            other => AuditVaultError::KeyUnavailable(other.to_string()),
        }
    }
}

fn to_key(bytes: &[u8], tier: &str) -> Result<Zeroizing<[u8; 32]>, TierError> {
    if bytes.len() != DATA_KEY_LEN {
        return Err(TierError::Backend(format!(
            "{tier} returned {} key bytes, expected {DATA_KEY_LEN}",
            bytes.len()
        )));
    }
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(bytes);
    Ok(key)
}

/// Tier 1: data key wrapped by a remote HSM.
pub struct HsmTier {
    connector: Arc<dyn HsmConnector>,
    wrapped_keys: Arc<dyn WrappedKeyStore>,
    key_name: String,
    connect_timeout: Duration,
    op_timeout: Duration,
}

impl HsmTier {
    pub fn new(
        connector: Arc<dyn HsmConnector>,
        wrapped_keys: Arc<dyn WrappedKeyStore>,
        config: &HsmConfig,
    ) -> Self {
        Self {
            connector,
            wrapped_keys,
            key_name: config.key_name.clone(),
            connect_timeout: config.connect_timeout(),
            op_timeout: config.op_timeout(),
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Connect if `session` is empty, then unwrap (or first create) the data
    /// key. A failed attempt clears `session` so the next one reconnects.
    pub async fn acquire(
        &self,
        session: &mut Option<Arc<dyn HsmClient>>,
    ) -> Result<Zeroizing<[u8; 32]>, TierError> {
        let client = self.session(session).await?;

        let result = match tokio::time::timeout(self.op_timeout, self.unwrap_data_key(&client)).await
        {
            Ok(result) => result,
            Err(_) => Err(TierError::Timeout { operation: "hsm.unwrap_key", timeout: self.op_timeout }),
        };

        if result.is_err() {
            *session = None;
        }
        result
    }

    /// Names of the keys visible to this HSM session.
    pub async fn list_keys(
        &self,
        session: &mut Option<Arc<dyn HsmClient>>,
    ) -> Result<Vec<String>, TierError> {
        let client = self.session(session).await?;
        match tokio::time::timeout(self.op_timeout, client.list_keys()).await {
            Ok(result) => result,
            Err(_) => Err(TierError::Timeout { operation: "hsm.list_keys", timeout: self.op_timeout }),
        }
    }

    async fn session(
        &self,
        session: &mut Option<Arc<dyn HsmClient>>,
    ) -> Result<Arc<dyn HsmClient>, TierError> {
        if let Some(client) = session.as_ref() {
            return Ok(Arc::clone(client));
        }

        let client = match tokio::time::timeout(
            self.connect_timeout,
            self.connector.connect(self.connect_timeout),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(TierError::Timeout {
                    operation: "hsm.connect",
                    timeout: self.connect_timeout,
                })
            }
        };

        debug!(key_name = %self.key_name, "key_provider.hsm_connected");
        *session = Some(Arc::clone(&client));
        Ok(client)
    }

    async fn unwrap_data_key(
        &self,
        client: &Arc<dyn HsmClient>,
    ) -> Result<Zeroizing<[u8; 32]>, TierError> {
        let handle = client.get_key(&self.key_name).await?;

        let wrapped = self
            .wrapped_keys
            .load(&self.key_name)
            .await
            .map_err(|e| TierError::Backend(format!("loading wrapped key: {e}")))?;

        match wrapped {
            Some(wrapped) => {
                let unwrapped = client.decrypt(&handle, WRAP_ALGORITHM, &wrapped).await?;
                to_key(&unwrapped, "hsm")
            }
            None => {
                let data_key = Zeroizing::new(random_bytes(DATA_KEY_LEN));
                let wrapped = client.encrypt(&handle, WRAP_ALGORITHM, &data_key).await?;
                self.wrapped_keys
                    .store(&self.key_name, &wrapped)
                    .await
                    .map_err(|e| TierError::Backend(format!("persisting wrapped key: {e}")))?;

                info!(key_name = %self.key_name, "key_provider.data_key_provisioned");
                to_key(&data_key, "hsm")
            }
        }
    }
}

/// Tier 2: key sealed to the local TPM.
pub struct TpmTier {
    device: Arc<dyn TpmDevice>,
}

impl TpmTier {
    pub fn new(device: Arc<dyn TpmDevice>) -> Self {
        Self { device }
    }

    /// Create the primary object if `handle` is empty, then unseal.
    pub async fn acquire(
        &self,
        handle: &mut Option<TpmHandle>,
    ) -> Result<Zeroizing<[u8; 32]>, TierError> {
        let device = Arc::clone(&self.device);
        let existing = *handle;

        let joined = tokio::task::spawn_blocking(move || {
            let primary = match existing {
                Some(primary) => primary,
                None => device.create_primary(PRIMARY_HIERARCHY, TPM_PRIMARY_ALGORITHM)?,
            };
            let unsealed = device.unseal(primary)?;
            Ok::<_, TierError>((primary, to_key(&unsealed, "tpm")?))
        })
        .await
        .map_err(|e| TierError::Backend(format!("tpm task failed: {e}")))?;

        match joined {
            Ok((primary, key)) => {
                *handle = Some(primary);
                Ok(key)
            }
            Err(err) => {
                *handle = None;
                Err(err)
            }
        }
    }
}

/// Tier 3: PBKDF2-HMAC-SHA512 over the master secret.
pub struct SoftwareTier {
    master_secrets: Arc<dyn MasterSecretStore>,
    iterations: u32,
}

impl SoftwareTier {
    pub fn new(master_secrets: Arc<dyn MasterSecretStore>, iterations: u32) -> Self {
        Self { master_secrets, iterations }
    }

    /// Derive the AES and HMAC halves. Only fails when the master secret
    /// cannot be loaded or the iteration count is rejected.
    pub async fn acquire(&self) -> Result<DerivedKeyPair, TierError> {
        let master = self
            .master_secrets
            .load_or_provision()
            .await
            .map_err(|e| TierError::Misconfigured(format!("master secret: {e}")))?;
        let iterations = self.iterations;

        tokio::task::spawn_blocking(move || {
            DerivedKeyPair::derive(&master.secret, &master.salt, iterations)
                .map_err(|e| TierError::Misconfigured(e.to_string()))
        })
        .await
        .map_err(|e| TierError::Backend(format!("key derivation task failed: {e}")))?
    }
}
