//! Scriptable HSM, TPM and master-secret fakes with call counters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use auditvault_core::keys::{
    FallbackEvent, HsmClient, HsmConnector, HsmKeyHandle, KeyEventSink, MasterSecret,
    MasterSecretStore, TierError, TpmDevice, TpmHandle, TpmHierarchy,
};
use auditvault_domain::{AuditVaultError, Result as DomainResult};
use zeroize::Zeroizing;

const WRAP_MASK: u8 = 0x5a;

/// How the mock HSM responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsmMode {
    Healthy,
    /// `connect` fails immediately.
    Unreachable,
    /// `connect` never completes.
    Hang,
    /// Connects, but `get_key` never completes.
    StallOnGetKey,
}

#[derive(Debug)]
struct HsmState {
    mode: Mutex<HsmMode>,
    connects: AtomicUsize,
    get_key_calls: AtomicUsize,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
}

/// In-memory HSM. "Wrapping" is a byte mask so unwrap is checkable.
#[derive(Debug, Clone)]
pub struct MockHsm {
    state: Arc<HsmState>,
}

impl MockHsm {
    pub fn new(mode: HsmMode) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(HsmState {
                mode: Mutex::new(mode),
                connects: AtomicUsize::new(0),
                get_key_calls: AtomicUsize::new(0),
                encrypt_calls: AtomicUsize::new(0),
                decrypt_calls: AtomicUsize::new(0),
            }),
        })
    }

    pub fn set_mode(&self, mode: HsmMode) {
        *self.state.mode.lock().unwrap() = mode;
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Remote key lookups, one per acquisition through this tier.
    pub fn remote_calls(&self) -> usize {
        self.state.get_key_calls.load(Ordering::SeqCst)
    }

    pub fn encrypt_calls(&self) -> usize {
        self.state.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.state.decrypt_calls.load(Ordering::SeqCst)
    }

    fn mode(&self) -> HsmMode {
        *self.state.mode.lock().unwrap()
    }
}

#[async_trait]
impl HsmConnector for MockHsm {
    async fn connect(&self, _timeout: Duration) -> Result<Arc<dyn HsmClient>, TierError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        match self.mode() {
            HsmMode::Unreachable => Err(TierError::Unavailable("connection refused".into())),
            HsmMode::Hang => std::future::pending().await,
            HsmMode::Healthy | HsmMode::StallOnGetKey => {
                Ok(Arc::new(MockHsmSession { hsm: self.clone() }))
            }
        }
    }
}

struct MockHsmSession {
    hsm: MockHsm,
}

fn mask(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|b| b ^ WRAP_MASK).collect()
}

#[async_trait]
impl HsmClient for MockHsmSession {
    async fn list_keys(&self) -> Result<Vec<String>, TierError> {
        Ok(vec!["audit-log-encryption-key".to_string(), "legacy-key".to_string()])
    }

    async fn get_key(&self, name: &str) -> Result<HsmKeyHandle, TierError> {
        self.hsm.state.get_key_calls.fetch_add(1, Ordering::SeqCst);
        if self.hsm.mode() == HsmMode::StallOnGetKey {
            return std::future::pending().await;
        }
        Ok(HsmKeyHandle { name: name.to_string(), version: Some("v1".into()) })
    }

    async fn encrypt(
        &self,
        _key: &HsmKeyHandle,
        _algorithm: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, TierError> {
        self.hsm.state.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(mask(plaintext))
    }

    async fn decrypt(
        &self,
        _key: &HsmKeyHandle,
        _algorithm: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, TierError> {
        self.hsm.state.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Zeroizing::new(mask(ciphertext)))
    }
}

/// TPM fake that either unseals a fixed key or reports itself unavailable.
#[derive(Debug)]
pub struct MockTpm {
    key: Option<[u8; 32]>,
    primaries: AtomicUsize,
    unseals: AtomicUsize,
}

impl MockTpm {
    pub fn available(key: [u8; 32]) -> Arc<Self> {
        Arc::new(Self { key: Some(key), primaries: AtomicUsize::new(0), unseals: AtomicUsize::new(0) })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self { key: None, primaries: AtomicUsize::new(0), unseals: AtomicUsize::new(0) })
    }

    pub fn primaries(&self) -> usize {
        self.primaries.load(Ordering::SeqCst)
    }

    pub fn unseals(&self) -> usize {
        self.unseals.load(Ordering::SeqCst)
    }
}

impl TpmDevice for MockTpm {
    fn create_primary(
        &self,
        _hierarchy: TpmHierarchy,
        _algorithm: &str,
    ) -> Result<TpmHandle, TierError> {
        self.primaries.fetch_add(1, Ordering::SeqCst);
        match self.key {
            Some(_) => Ok(TpmHandle(0x8100_0001)),
            None => Err(TierError::Unavailable("no TPM device".into())),
        }
    }

    fn unseal(&self, _handle: TpmHandle) -> Result<Zeroizing<Vec<u8>>, TierError> {
        self.unseals.fetch_add(1, Ordering::SeqCst);
        self.key
            .map(|key| Zeroizing::new(key.to_vec()))
            .ok_or_else(|| TierError::Unavailable("no TPM device".into()))
    }
}

/// Fixed master secret and salt.
#[derive(Debug)]
pub struct StaticMasterSecret {
    secret: Vec<u8>,
    salt: Vec<u8>,
    loads: AtomicUsize,
}

impl StaticMasterSecret {
    pub fn new(secret: &[u8], salt: &[u8]) -> Arc<Self> {
        Arc::new(Self { secret: secret.to_vec(), salt: salt.to_vec(), loads: AtomicUsize::new(0) })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MasterSecretStore for StaticMasterSecret {
    async fn load_or_provision(&self) -> DomainResult<MasterSecret> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(MasterSecret { secret: Zeroizing::new(self.secret.clone()), salt: self.salt.clone() })
    }
}

/// Master secret store whose backing file cannot be read.
#[derive(Debug, Default)]
pub struct BrokenMasterSecret;

#[async_trait]
impl MasterSecretStore for BrokenMasterSecret {
    async fn load_or_provision(&self) -> DomainResult<MasterSecret> {
        Err(AuditVaultError::Misconfigured("master secret file is unreadable".into()))
    }
}

/// Collects every fallback event.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<FallbackEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<FallbackEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl KeyEventSink for RecordingEventSink {
    fn fallback_activated(&self, event: &FallbackEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
