//! Persistence for HSM-wrapped data keys

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use auditvault_core::WrappedKeyStore;
use auditvault_domain::{AuditVaultError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::atomic::{blocking, write_atomic, PRIVATE_FILE_MODE};

/// [`WrappedKeyStore`] keeping `{ key_name: base64 }` in a JSON file.
///
/// Wrapped keys are only usable through the HSM, but the file is still kept
/// owner-only.
#[derive(Debug, Clone)]
pub struct FileWrappedKeyStore {
    path: PathBuf,
}

impl FileWrappedKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn read_all(path: &PathBuf) -> Result<BTreeMap<String, String>> {
    match fs::read(path) {
        Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
            AuditVaultError::Serialization(format!("wrapped key file is malformed: {e}"))
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl WrappedKeyStore for FileWrappedKeyStore {
    async fn load(&self, key_name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path.clone();
        let key_name = key_name.to_string();
        blocking(move || {
            read_all(&path)?
                .get(&key_name)
                .map(|encoded| {
                    STANDARD.decode(encoded).map_err(|e| {
                        AuditVaultError::Serialization(format!("wrapped key is not base64: {e}"))
                    })
                })
                .transpose()
        })
        .await
    }

    async fn store(&self, key_name: &str, wrapped: &[u8]) -> Result<()> {
        let path = self.path.clone();
        let key_name = key_name.to_string();
        let encoded = STANDARD.encode(wrapped);
        blocking(move || {
            let mut keys = read_all(&path)?;
            keys.insert(key_name, encoded);
            write_atomic(&path, &serde_json::to_vec_pretty(&keys)?, Some(PRIVATE_FILE_MODE))
        })
        .await
    }
}
