//! Batch AES-256-GCM encryption of a record's sensitive fields
//!
//! All fields encrypted by one call share one nonce, one tag and one
//! ciphertext, so tampering with any of them invalidates the whole batch.
//! The record id is bound as associated data, which stops a sealed payload
//! from being replayed onto a different record.

use std::collections::BTreeMap;
use std::sync::Arc;

use auditvault_common::{EncryptionService, SealedBox};
use auditvault_domain::{AuditVaultError, FieldDescriptor, Result, SealedFields, SecretMaterial, SensitiveRecord};
use chrono::Utc;
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use crate::instrumentation::CryptoMetrics;
use crate::keys::KeyProvider;

/// Decrypted field values keyed by field name.
pub type PlainFields = BTreeMap<&'static str, String>;

/// Encrypts and decrypts the sensitive fields declared by a
/// [`SensitiveRecord`].
#[derive(Clone)]
pub struct FieldCipher {
    keys: Arc<dyn KeyProvider>,
    metrics: Arc<CryptoMetrics>,
}

impl FieldCipher {
    pub fn new(keys: Arc<dyn KeyProvider>, metrics: Arc<CryptoMetrics>) -> Self {
        Self { keys, metrics }
    }

    /// Seal every field in `field_names` that currently holds a value.
    ///
    /// Returns the names sealed by this call. When none of the named fields
    /// has a value the record is left untouched. Fields already sealed on the
    /// record are opened and re-sealed together with the new ones under a
    /// fresh nonce.
    #[instrument(skip_all, fields(record_id = %record.record_id()))]
    pub async fn encrypt_fields<R: SensitiveRecord>(
        &self,
        record: &mut R,
        field_names: &[&str],
    ) -> Result<Vec<&'static str>> {
        let mut subset: Vec<&'static FieldDescriptor<R>> = Vec::with_capacity(field_names.len());
        for name in field_names {
            let descriptor = R::field(name).ok_or_else(|| {
                AuditVaultError::Misconfigured(format!("'{name}' is not a sensitive field"))
            })?;
            if (descriptor.value)(record).is_some()
                && !subset.iter().any(|seen| seen.name == descriptor.name)
            {
                subset.push(descriptor);
            }
        }

        if subset.is_empty() {
            debug!("field_cipher.nothing_to_encrypt");
            return Ok(Vec::new());
        }

        let key = self.keys.get_key().await?;
        let aad = record.record_id();

        let mut payload: BTreeMap<String, String> = if record.has_encrypted_fields() {
            self.open_payload(record, &key, aad.as_bytes())?
        } else {
            BTreeMap::new()
        };
        for descriptor in &subset {
            if let Some(value) = (descriptor.value)(record) {
                payload.insert(descriptor.name.to_string(), value.to_string());
            }
        }

        let plaintext = Zeroizing::new(serde_json::to_vec(&payload)?);
        let service = EncryptionService::new(key.encryption_key())?;
        let sealed = self.metrics.measure_sync("field_cipher.encrypt", key.source(), || {
            service.seal(&plaintext, aad.as_bytes())
        })?;

        record.set_sealed(Some(SealedFields {
            nonce: sealed.nonce,
            tag: sealed.tag,
            ciphertext: sealed.ciphertext,
            key_source: key.source(),
            sealed_at: Utc::now(),
        }));
        for descriptor in &subset {
            (descriptor.set_value)(record, None);
            (descriptor.set_encrypted)(record, true);
        }

        let names: Vec<&'static str> = subset.iter().map(|descriptor| descriptor.name).collect();
        debug!(fields = ?names, source = key.source().as_str(), "field_cipher.encrypted");
        Ok(names)
    }

    /// Restore every field flagged encrypted.
    ///
    /// Either every flagged field is restored and its flag cleared, or the
    /// record is left untouched and `Decryption` is returned.
    #[instrument(skip_all, fields(record_id = %record.record_id()))]
    pub async fn decrypt_fields<R: SensitiveRecord>(&self, record: &mut R) -> Result<PlainFields> {
        let flagged: Vec<&'static FieldDescriptor<R>> = R::sensitive_fields()
            .iter()
            .filter(|descriptor| (descriptor.is_encrypted)(record))
            .collect();

        if flagged.is_empty() {
            return Ok(PlainFields::new());
        }

        let key = self.keys.get_key().await?;
        let aad = record.record_id();
        let mut payload = self.open_payload(record, &key, aad.as_bytes())?;

        let mut restored = PlainFields::new();
        for descriptor in &flagged {
            let value = payload.remove(descriptor.name).ok_or_else(|| {
                AuditVaultError::Decryption(format!(
                    "sealed payload has no value for '{}'",
                    descriptor.name
                ))
            })?;
            restored.insert(descriptor.name, value);
        }

        if !payload.is_empty() {
            let orphaned: Vec<String> = payload.into_keys().collect();
            warn!(fields = ?orphaned, "field_cipher.unflagged_sealed_fields");
            return Err(AuditVaultError::Decryption(format!(
                "sealed payload holds fields not flagged encrypted: {}",
                orphaned.join(", ")
            )));
        }

        for descriptor in &flagged {
            (descriptor.set_value)(record, restored.get(descriptor.name).cloned());
            (descriptor.set_encrypted)(record, false);
        }
        record.set_sealed(None);

        Ok(restored)
    }

    fn open_payload<R: SensitiveRecord>(
        &self,
        record: &R,
        key: &SecretMaterial,
        aad: &[u8],
    ) -> Result<BTreeMap<String, String>> {
        let sealed = record.sealed().ok_or_else(|| {
            AuditVaultError::Decryption("fields are flagged encrypted but no payload is stored".into())
        })?;

        let service = EncryptionService::new(key.encryption_key())?;
        let sealed_box = SealedBox {
            nonce: sealed.nonce,
            tag: sealed.tag,
            ciphertext: sealed.ciphertext.clone(),
        };

        let plaintext = self
            .metrics
            .measure_sync("field_cipher.decrypt", key.source(), || service.open(&sealed_box, aad))
            .map_err(|_| {
                warn!(sealed_with = sealed.key_source.as_str(), "field_cipher.decrypt_failed");
                AuditVaultError::Decryption("authentication tag mismatch".into())
            })?;
        let plaintext = Zeroizing::new(plaintext);

        serde_json::from_slice(&plaintext)
            .map_err(|e| AuditVaultError::Decryption(format!("sealed payload is malformed: {e}")))
    }
}
