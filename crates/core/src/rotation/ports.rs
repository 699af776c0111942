//! Port interfaces for secret rotation

use async_trait::async_trait;
use auditvault_common::SecureString;
use auditvault_domain::{BackupReceipt, KeyHistory, KeyType, Result};
use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

/// Persisted home of the long-lived application secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Current value of `key_type`, or `None` when it has never been set.
    async fn read(&self, key_type: KeyType) -> Result<Option<SecureString>>;

    /// Replace the value of `key_type`. The store is either fully updated or
    /// left as it was.
    async fn write(&self, key_type: KeyType, value: &SecureString) -> Result<()>;

    /// Raw bytes of the whole store for backup, or `None` when the store does
    /// not exist yet.
    async fn snapshot(&self) -> Result<Option<Zeroizing<Vec<u8>>>>;
}

/// Persistence for [`KeyHistory`].
#[async_trait]
pub trait KeyHistoryStore: Send + Sync {
    /// Load the history; a store that does not exist yet yields an empty one.
    async fn load(&self) -> Result<KeyHistory>;

    async fn save(&self, history: &KeyHistory) -> Result<()>;
}

/// Destination for encrypted pre-rotation backups.
#[async_trait]
pub trait BackupSink: Send + Sync {
    async fn write_backup(
        &self,
        contents: &[u8],
        created_at: DateTime<Utc>,
    ) -> Result<BackupReceipt>;
}
