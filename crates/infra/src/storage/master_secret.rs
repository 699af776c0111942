//! Master secret for the software key tier

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use auditvault_common::crypto::random_bytes;
use auditvault_core::{MasterSecret, MasterSecretStore};
use auditvault_domain::constants::{MASTER_SECRET_LEN, SOFTWARE_SALT_LEN};
use auditvault_domain::{AuditVaultError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroizing;

use super::atomic::{blocking, write_atomic, PRIVATE_FILE_MODE};

/// On-disk document. `secret` is absent when the secret itself is supplied
/// through the environment and only the salt is persisted.
#[derive(Default, Serialize, Deserialize)]
struct MasterSecretFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
    salt: String,
}

/// [`MasterSecretStore`] reading a hex secret from an env var, else from a
/// private JSON file, provisioning both secret and salt on first use.
#[derive(Debug, Clone)]
pub struct FileMasterSecretStore {
    env_var: String,
    path: PathBuf,
}

impl FileMasterSecretStore {
    pub fn new(env_var: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { env_var: env_var.into(), path: path.into() }
    }
}

#[async_trait]
impl MasterSecretStore for FileMasterSecretStore {
    async fn load_or_provision(&self) -> Result<MasterSecret> {
        let from_env = match std::env::var(&self.env_var) {
            Ok(value) if !value.trim().is_empty() => {
                let value = Zeroizing::new(value);
                Some(decode_secret(value.trim(), &self.env_var)?)
            }
            _ => None,
        };
        let env_var = self.env_var.clone();
        let path = self.path.clone();

        blocking(move || {
            let mut file: MasterSecretFile = match fs::read(&path) {
                Ok(raw) => {
                    let raw = Zeroizing::new(raw);
                    serde_json::from_slice(&raw).map_err(|e| {
                        AuditVaultError::Misconfigured(format!(
                            "master secret file {} is malformed: {e}",
                            path.display()
                        ))
                    })?
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => MasterSecretFile::default(),
                Err(err) => return Err(err.into()),
            };

            let mut dirty = false;
            if file.salt.is_empty() {
                file.salt = hex::encode(random_bytes(SOFTWARE_SALT_LEN));
                dirty = true;
            }

            let stored = match (&from_env, file.secret.as_deref()) {
                (None, Some(encoded)) => Some(decode_secret(encoded, &path.display().to_string())?),
                _ => None,
            };

            let secret = match from_env.or(stored) {
                Some(secret) => secret,
                None => {
                    let generated = Zeroizing::new(random_bytes(MASTER_SECRET_LEN));
                    file.secret = Some(hex::encode(&*generated));
                    dirty = true;
                    warn!(path = %path.display(), env_var = %env_var, "master_secret.generated");
                    generated
                }
            };

            let salt = hex::decode(&file.salt).map_err(|e| {
                AuditVaultError::Misconfigured(format!("master secret salt is not hex: {e}"))
            })?;

            if dirty {
                let encoded = Zeroizing::new(serde_json::to_vec_pretty(&file)?);
                write_atomic(&path, &encoded, Some(PRIVATE_FILE_MODE))?;
                info!(path = %path.display(), "master_secret.persisted");
            }
            if let Some(secret) = file.secret.as_mut() {
                zeroize::Zeroize::zeroize(secret);
            }

            Ok(MasterSecret { secret, salt })
        })
        .await
    }
}

fn decode_secret(encoded: &str, origin: &str) -> Result<Zeroizing<Vec<u8>>> {
    let decoded = Zeroizing::new(hex::decode(encoded).map_err(|_| {
        AuditVaultError::Misconfigured(format!("master secret from {origin} is not valid hex"))
    })?);
    if decoded.len() < MASTER_SECRET_LEN {
        return Err(AuditVaultError::Misconfigured(format!(
            "master secret from {origin} must be at least {MASTER_SECRET_LEN} bytes"
        )));
    }
    Ok(decoded)
}
