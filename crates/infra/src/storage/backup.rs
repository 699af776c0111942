//! Password-encrypted backups of the secret store
//!
//! Artifact layout (JSON, binary fields base64):
//!
//! ```json
//! { "version": 1, "created_at": "...", "salt": "...", "nonce": "...", "ciphertext": "..." }
//! ```
//!
//! The AES-256-GCM key is PBKDF2-HMAC-SHA512 over the password and a fresh
//! 16-byte salt. `ciphertext` carries the 16-byte tag at its end.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use auditvault_common::crypto::{random_bytes, TAG_LEN};
use auditvault_common::{EncryptionService, SealedBox, SecureString};
use auditvault_core::BackupSink;
use auditvault_domain::constants::{BACKUP_FORMAT_VERSION, BACKUP_SALT_LEN, MIN_PBKDF2_ITERATIONS};
use auditvault_domain::{AuditVaultError, BackupReceipt, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

use super::atomic::{blocking, write_atomic, PRIVATE_FILE_MODE};

#[derive(Debug, Serialize, Deserialize)]
struct BackupArtifact {
    version: u32,
    created_at: DateTime<Utc>,
    salt: String,
    nonce: String,
    ciphertext: String,
}

/// [`BackupSink`] writing `keys_backup_<timestamp>.enc` files.
#[derive(Debug, Clone)]
pub struct EncryptedBackupWriter {
    dir: PathBuf,
    password_env: String,
    iterations: u32,
}

impl EncryptedBackupWriter {
    /// Writer into `dir`, reading the password from `password_env` at
    /// backup time.
    pub fn new(dir: impl Into<PathBuf>, password_env: impl Into<String>) -> Self {
        Self { dir: dir.into(), password_env: password_env.into(), iterations: MIN_PBKDF2_ITERATIONS }
    }

    fn password(&self) -> Result<SecureString> {
        match std::env::var(&self.password_env) {
            Ok(password) if !password.is_empty() => Ok(SecureString::new(password)),
            _ => Err(AuditVaultError::Misconfigured(format!(
                "{} must be set to encrypt key backups",
                self.password_env
            ))),
        }
    }
}

#[async_trait]
impl BackupSink for EncryptedBackupWriter {
    async fn write_backup(&self, contents: &[u8], created_at: DateTime<Utc>) -> Result<BackupReceipt> {
        let password = self.password()?;
        let dir = self.dir.clone();
        let iterations = self.iterations;
        let contents = Zeroizing::new(contents.to_vec());

        let (location, size_bytes) = blocking(move || {
            let artifact = seal_artifact(&contents, &password, iterations, created_at)?;
            let encoded = serde_json::to_vec_pretty(&artifact)?;

            let path = unused_path(&dir, created_at);
            write_atomic(&path, &encoded, Some(PRIVATE_FILE_MODE))?;
            Ok((path, encoded.len() as u64))
        })
        .await?;

        info!(path = %location.display(), size_bytes, "backup.written");
        Ok(BackupReceipt { location: location.display().to_string(), created_at, size_bytes })
    }
}

fn seal_artifact(
    contents: &[u8],
    password: &SecureString,
    iterations: u32,
    created_at: DateTime<Utc>,
) -> Result<BackupArtifact> {
    let salt = random_bytes(BACKUP_SALT_LEN);
    let service = EncryptionService::from_password(password.expose().as_bytes(), &salt, iterations)?;
    let sealed = service.seal(contents, &[])?;

    let mut ciphertext = sealed.ciphertext;
    ciphertext.extend_from_slice(&sealed.tag);

    Ok(BackupArtifact {
        version: BACKUP_FORMAT_VERSION,
        created_at,
        salt: STANDARD.encode(salt),
        nonce: STANDARD.encode(sealed.nonce),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// `keys_backup_<YYYYmmdd_HHMMSS>.enc`, suffixed when a backup from the same
/// second already exists.
fn unused_path(dir: &Path, created_at: DateTime<Utc>) -> PathBuf {
    let stem = format!("keys_backup_{}", created_at.format("%Y%m%d_%H%M%S"));
    let mut path = dir.join(format!("{stem}.enc"));
    let mut counter = 1;
    while path.exists() {
        path = dir.join(format!("{stem}_{counter}.enc"));
        counter += 1;
    }
    path
}

/// Decrypt a backup artifact back to the secret-store contents.
///
/// Fails with `Decryption` on a wrong password or a modified artifact.
pub fn restore_backup(path: &Path, password: &SecureString) -> Result<Zeroizing<Vec<u8>>> {
    let raw = fs::read(path)?;
    let artifact: BackupArtifact = serde_json::from_slice(&raw)
        .map_err(|e| AuditVaultError::Serialization(format!("backup artifact is malformed: {e}")))?;

    if artifact.version != BACKUP_FORMAT_VERSION {
        return Err(AuditVaultError::Serialization(format!(
            "unsupported backup format version {}",
            artifact.version
        )));
    }

    let decode = |field: &str, value: &str| {
        STANDARD.decode(value).map_err(|e| {
            AuditVaultError::Serialization(format!("backup field '{field}' is not base64: {e}"))
        })
    };
    let salt = decode("salt", &artifact.salt)?;
    let nonce = decode("nonce", &artifact.nonce)?;
    let mut ciphertext = decode("ciphertext", &artifact.ciphertext)?;

    let nonce: [u8; 12] = nonce
        .try_into()
        .map_err(|_| AuditVaultError::Serialization("backup nonce must be 12 bytes".into()))?;
    if ciphertext.len() < TAG_LEN {
        return Err(AuditVaultError::Decryption("backup ciphertext is truncated".into()));
    }
    let tag_bytes = ciphertext.split_off(ciphertext.len() - TAG_LEN);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_bytes);

    let service =
        EncryptionService::from_password(password.expose().as_bytes(), &salt, MIN_PBKDF2_ITERATIONS)?;
    let plaintext = service
        .open(&SealedBox { nonce, tag, ciphertext }, &[])
        .map_err(|_| AuditVaultError::Decryption("wrong backup password or corrupted artifact".into()))?;

    Ok(Zeroizing::new(plaintext))
}
