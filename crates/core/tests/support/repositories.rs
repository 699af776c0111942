//! In-memory implementations of the core storage ports.
//!
//! Each mock keeps its state behind a mutex so tests can seed it up front and
//! inspect it after the service under test has run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use auditvault_common::SecureString;
use auditvault_core::keys::{KeyProvider, WrappedKeyStore};
use auditvault_core::rotation::{BackupSink, KeyHistoryStore, SecretStore};
use auditvault_domain::{
    AuditVaultError, BackupReceipt, KeyHistory, KeySource, KeyType, Result as DomainResult,
    SecretMaterial,
};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

/// Wrapped data keys by key name.
#[derive(Debug, Default)]
pub struct MockWrappedKeyStore {
    keys: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MockWrappedKeyStore {
    pub fn stored(&self, key_name: &str) -> Option<Vec<u8>> {
        self.keys.lock().unwrap().get(key_name).cloned()
    }
}

#[async_trait]
impl WrappedKeyStore for MockWrappedKeyStore {
    async fn load(&self, key_name: &str) -> DomainResult<Option<Vec<u8>>> {
        Ok(self.stored(key_name))
    }

    async fn store(&self, key_name: &str, wrapped: &[u8]) -> DomainResult<()> {
        self.keys.lock().unwrap().insert(key_name.to_string(), wrapped.to_vec());
        Ok(())
    }
}

/// Secret store held in a map, with optional scripted failures.
#[derive(Debug, Default)]
pub struct MockSecretStore {
    values: Mutex<BTreeMap<KeyType, String>>,
    missing: bool,
    failing: Mutex<BTreeSet<KeyType>>,
    cancel_after_write: Mutex<Option<CancellationToken>>,
    writes: AtomicUsize,
}

impl MockSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one value per key type.
    pub fn seeded(values: &[(KeyType, &str)]) -> Self {
        let store = Self::default();
        {
            let mut map = store.values.lock().unwrap();
            for (key_type, value) in values {
                map.insert(*key_type, (*value).to_string());
            }
        }
        store
    }

    /// Store whose backing file does not exist.
    pub fn missing() -> Self {
        Self { missing: true, ..Self::default() }
    }

    pub fn fail_writes_for(self, key_type: KeyType) -> Self {
        self.failing.lock().unwrap().insert(key_type);
        self
    }

    /// Cancel `token` after the first successful write.
    pub fn cancel_after_first_write(self, token: CancellationToken) -> Self {
        *self.cancel_after_write.lock().unwrap() = Some(token);
        self
    }

    pub fn value(&self, key_type: KeyType) -> Option<String> {
        self.values.lock().unwrap().get(&key_type).cloned()
    }

    pub fn set(&self, key_type: KeyType, value: &str) {
        self.values.lock().unwrap().insert(key_type, value.to_string());
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn render(&self) -> String {
        self.values
            .lock()
            .unwrap()
            .iter()
            .map(|(key_type, value)| format!("{}={}\n", key_type.env_name(), value))
            .collect()
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn read(&self, key_type: KeyType) -> DomainResult<Option<SecureString>> {
        Ok(self.value(key_type).map(SecureString::from))
    }

    async fn write(&self, key_type: KeyType, value: &SecureString) -> DomainResult<()> {
        if self.failing.lock().unwrap().contains(&key_type) {
            return Err(AuditVaultError::Io(format!("disk full while writing {key_type}")));
        }
        self.set(key_type, value.expose());
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.cancel_after_write.lock().unwrap().take() {
            token.cancel();
        }
        Ok(())
    }

    async fn snapshot(&self) -> DomainResult<Option<Zeroizing<Vec<u8>>>> {
        if self.missing {
            return Ok(None);
        }
        Ok(Some(Zeroizing::new(self.render().into_bytes())))
    }
}

/// Key history held in memory.
#[derive(Debug, Default)]
pub struct MockKeyHistoryStore {
    history: Mutex<KeyHistory>,
}

impl MockKeyHistoryStore {
    pub fn with_history(history: KeyHistory) -> Self {
        Self { history: Mutex::new(history) }
    }

    pub fn history(&self) -> KeyHistory {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeyHistoryStore for MockKeyHistoryStore {
    async fn load(&self) -> DomainResult<KeyHistory> {
        Ok(self.history())
    }

    async fn save(&self, history: &KeyHistory) -> DomainResult<()> {
        *self.history.lock().unwrap() = history.clone();
        Ok(())
    }
}

/// Captures backup contents instead of encrypting them to disk.
#[derive(Debug, Default)]
pub struct MockBackupSink {
    backups: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

impl MockBackupSink {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn backups(&self) -> Vec<Vec<u8>> {
        self.backups.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackupSink for MockBackupSink {
    async fn write_backup(
        &self,
        contents: &[u8],
        created_at: DateTime<Utc>,
    ) -> DomainResult<BackupReceipt> {
        if self.fail {
            return Err(AuditVaultError::Misconfigured("BACKUP_MASTER_PASSWORD is not set".into()));
        }
        let mut backups = self.backups.lock().unwrap();
        backups.push(contents.to_vec());
        Ok(BackupReceipt {
            location: format!("memory://backup/{}", backups.len()),
            created_at,
            size_bytes: contents.len() as u64,
        })
    }
}

/// Key provider that always hands out the same key.
#[derive(Debug)]
pub struct StaticKeyProvider {
    key: [u8; 32],
    source: KeySource,
    gets: AtomicUsize,
    invalidations: AtomicUsize,
    fail: bool,
}

impl StaticKeyProvider {
    pub fn new(key: [u8; 32]) -> Arc<Self> {
        Arc::new(Self::build(key, false))
    }

    /// Provider whose chain is exhausted.
    pub fn exhausted() -> Arc<Self> {
        Arc::new(Self::build([0u8; 32], true))
    }

    fn build(key: [u8; 32], fail: bool) -> Self {
        Self {
            key,
            source: KeySource::Hsm,
            gets: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
            fail,
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn get_key(&self) -> DomainResult<Arc<SecretMaterial>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuditVaultError::KeyUnavailable("all tiers failed".into()));
        }
        Ok(Arc::new(SecretMaterial::new(
            self.key,
            self.source,
            Instant::now(),
            Duration::from_secs(300),
            Utc::now(),
        )))
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}
