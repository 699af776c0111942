//! JSON key history store

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use auditvault_core::KeyHistoryStore;
use auditvault_domain::{AuditVaultError, KeyHistory, Result};

use super::atomic::{blocking, write_atomic};

/// [`KeyHistoryStore`] persisted as one pretty-printed JSON document.
///
/// A missing file is an empty history.
#[derive(Debug, Clone)]
pub struct JsonKeyHistoryStore {
    path: PathBuf,
}

impl JsonKeyHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KeyHistoryStore for JsonKeyHistoryStore {
    async fn load(&self) -> Result<KeyHistory> {
        let path = self.path.clone();
        blocking(move || {
            let contents = match fs::read(&path) {
                Ok(contents) => contents,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Ok(KeyHistory::default())
                }
                Err(err) => return Err(err.into()),
            };
            serde_json::from_slice(&contents).map_err(|e| {
                AuditVaultError::Serialization(format!(
                    "key history at {} is malformed: {e}",
                    path.display()
                ))
            })
        })
        .await
    }

    async fn save(&self, history: &KeyHistory) -> Result<()> {
        let path = self.path.clone();
        let contents = serde_json::to_vec_pretty(history)?;
        blocking(move || write_atomic(&path, &contents, None)).await
    }
}
