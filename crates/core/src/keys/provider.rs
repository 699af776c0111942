//! Cached key acquisition over the HSM, TPM and software tiers

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auditvault_common::{Clock, SystemClock};
use auditvault_domain::{AuditVaultError, KeyProviderConfig, KeySource, Result, SecretMaterial};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use super::ports::{
    FallbackEvent, HsmClient, KeyEventSink, MasterSecretStore, TpmDevice, TpmHandle,
    TracingKeyEventSink,
};
use super::tier::{HsmTier, SoftwareTier, TierError, TpmTier};
use crate::instrumentation::CryptoMetrics;

/// Supplies the active symmetric key.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Return the cached key, or run the acquisition chain when the cache is
    /// empty or expired.
    async fn get_key(&self) -> Result<Arc<SecretMaterial>>;

    /// Drop the cached key so the next [`KeyProvider::get_key`] re-runs the
    /// chain.
    fn invalidate(&self);
}

/// Lazily constructed tier clients, guarded by the init lock.
#[derive(Default)]
struct TierSessions {
    hsm: Option<Arc<dyn HsmClient>>,
    tpm: Option<TpmHandle>,
}

/// [`KeyProvider`] that walks HSM, then TPM, then software derivation.
///
/// Cache reads take a read lock only. Acquisition runs under a single async
/// mutex and re-checks the cache after taking it, so concurrent callers on a
/// cold cache pay the connection cost once.
pub struct ChainedKeyProvider {
    hsm: Option<HsmTier>,
    tpm: Option<TpmTier>,
    software: SoftwareTier,
    events: Arc<dyn KeyEventSink>,
    metrics: Arc<CryptoMetrics>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cache: RwLock<Option<Arc<SecretMaterial>>>,
    sessions: Mutex<TierSessions>,
}

impl ChainedKeyProvider {
    /// Provider with only the software tier; add the others with
    /// [`ChainedKeyProvider::with_hsm`] and [`ChainedKeyProvider::with_tpm`].
    pub fn new(config: &KeyProviderConfig, master_secrets: Arc<dyn MasterSecretStore>) -> Self {
        Self {
            hsm: None,
            tpm: None,
            software: SoftwareTier::new(master_secrets, config.pbkdf2_iterations),
            events: Arc::new(TracingKeyEventSink),
            metrics: Arc::new(CryptoMetrics::default()),
            clock: Arc::new(SystemClock),
            ttl: config.cache_ttl(),
            cache: RwLock::new(None),
            sessions: Mutex::new(TierSessions::default()),
        }
    }

    pub fn with_hsm(mut self, hsm: HsmTier) -> Self {
        self.hsm = Some(hsm);
        self
    }

    pub fn with_tpm(mut self, device: Arc<dyn TpmDevice>) -> Self {
        self.tpm = Some(TpmTier::new(device));
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn KeyEventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<CryptoMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &Arc<CryptoMetrics> {
        &self.metrics
    }

    /// Key names visible to the configured HSM.
    pub async fn list_hsm_keys(&self) -> Result<Vec<String>> {
        let hsm = self
            .hsm
            .as_ref()
            .ok_or_else(|| AuditVaultError::Misconfigured("no HSM configured".into()))?;
        let mut sessions = self.sessions.lock().await;
        Ok(hsm.list_keys(&mut sessions.hsm).await?)
    }

    fn cached(&self) -> Option<Arc<SecretMaterial>> {
        let now = self.clock.now();
        self.cache.read().as_ref().filter(|material| !material.is_expired(now)).map(Arc::clone)
    }

    fn material(&self, key: &[u8; 32], source: KeySource) -> SecretMaterial {
        SecretMaterial::new(*key, source, self.clock.now(), self.ttl, self.clock.utc_now())
    }

    async fn acquire(&self, sessions: &mut TierSessions) -> Result<SecretMaterial> {
        let mut skipped: Vec<String> = Vec::with_capacity(2);

        match &self.hsm {
            Some(hsm) => {
                let attempt = hsm.acquire(&mut sessions.hsm);
                match self.metrics.measure("key_provider.hsm", KeySource::Hsm, attempt).await {
                    Ok(key) => return Ok(self.material(&key, KeySource::Hsm)),
                    Err(err) => {
                        debug!(error = %err, "key_provider.hsm_failed");
                        skipped.push(format!("hsm: {err}"));
                    }
                }
            }
            None => skipped.push("hsm: not configured".to_string()),
        }

        let material = match self.acquire_fallback(sessions, &mut skipped).await {
            Ok(material) => material,
            Err(err) => {
                skipped.push(format!("software: {err}"));
                let reason = skipped.join("; ");
                error!(reason = %reason, "key_provider.exhausted");
                return Err(AuditVaultError::KeyUnavailable(reason));
            }
        };

        self.events.fallback_activated(&FallbackEvent {
            source: material.source(),
            reason: skipped.join("; "),
        });
        Ok(material)
    }

    async fn acquire_fallback(
        &self,
        sessions: &mut TierSessions,
        skipped: &mut Vec<String>,
    ) -> std::result::Result<SecretMaterial, TierError> {
        match &self.tpm {
            Some(tpm) => {
                let attempt = tpm.acquire(&mut sessions.tpm);
                match self.metrics.measure("key_provider.tpm", KeySource::Tpm, attempt).await {
                    Ok(key) => return Ok(self.material(&key, KeySource::Tpm)),
                    Err(err) => {
                        debug!(error = %err, "key_provider.tpm_failed");
                        skipped.push(format!("tpm: {err}"));
                    }
                }
            }
            None => skipped.push("tpm: not configured".to_string()),
        }

        let attempt = self.software.acquire();
        let pair = self.metrics.measure("key_provider.software", KeySource::Software, attempt).await?;
        Ok(self.material(pair.encryption_key(), KeySource::Software).with_mac_key(*pair.mac_key()))
    }
}

#[async_trait]
impl KeyProvider for ChainedKeyProvider {
    #[instrument(skip_all)]
    async fn get_key(&self) -> Result<Arc<SecretMaterial>> {
        if let Some(material) = self.cached() {
            return Ok(material);
        }

        let mut sessions = self.sessions.lock().await;

        // Another caller may have filled the cache while we waited.
        if let Some(material) = self.cached() {
            return Ok(material);
        }

        let material = Arc::new(self.acquire(&mut sessions).await?);
        *self.cache.write() = Some(Arc::clone(&material));

        info!(source = material.source().as_str(), "key_provider.key_acquired");
        Ok(material)
    }

    fn invalidate(&self) {
        if self.cache.write().take().is_some() {
            info!("key_provider.cache_invalidated");
        }
    }
}
