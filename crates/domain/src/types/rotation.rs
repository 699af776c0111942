//! Rotation policy, version history and reporting types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::{KeyType, SecretEncoding};
use crate::errors::{AuditVaultError, Result};
use crate::impl_domain_status_conversions;

/// Static rotation policy for one key type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    pub rotation_interval_days: u32,
    pub retained_versions: usize,
    /// Length of a freshly generated secret, in raw bytes before encoding.
    pub key_length: usize,
    pub encoding: SecretEncoding,
}

impl RotationPolicy {
    /// Built-in policy for each key type.
    pub fn default_for(key_type: KeyType) -> Self {
        let (rotation_interval_days, retained_versions, key_length) = match key_type {
            KeyType::JwtSecret => (90, 5, 64),
            KeyType::SessionSecret => (30, 3, 32),
            KeyType::CsrfSecret => (30, 3, 32),
            KeyType::EncryptionKey => (180, 10, 32),
        };

        Self { rotation_interval_days, retained_versions, key_length, encoding: SecretEncoding::Base64 }
    }

    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.rotation_interval_days))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Rotated,
    Expired,
}

impl_domain_status_conversions!(KeyStatus {
    Active => "active",
    Rotated => "rotated",
    Expired => "expired",
});

/// One generation of a secret, identified only by its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyVersion {
    pub key_type: KeyType,
    pub fingerprint: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationReason {
    #[serde(rename = "scheduled_rotation")]
    Scheduled,
    #[serde(rename = "manual_rotation")]
    Manual,
}

impl RotationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled_rotation",
            Self::Manual => "manual_rotation",
        }
    }
}

/// Append-only record of one rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationHistoryEntry {
    pub key_type: KeyType,
    pub rotation_date: DateTime<Utc>,
    /// `None` when the store had no previous value.
    pub old_fingerprint: Option<String>,
    pub new_fingerprint: String,
    pub reason: RotationReason,
}

/// Persisted version bookkeeping for every key type.
///
/// `current` holds the active version, `versions` the bounded list of
/// rotated-out versions, and `expired` everything pruned from that list.
/// `rotation_history` only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyHistory {
    #[serde(default)]
    pub current: BTreeMap<KeyType, KeyVersion>,
    #[serde(default)]
    pub versions: BTreeMap<KeyType, Vec<KeyVersion>>,
    #[serde(default)]
    pub expired: BTreeMap<KeyType, Vec<KeyVersion>>,
    #[serde(default)]
    pub rotation_history: Vec<RotationHistoryEntry>,
}

impl KeyHistory {
    /// Apply one rotation: append the history entry, demote the previous
    /// version into the bounded list and expire whatever overflows
    /// `retained_versions`.
    ///
    /// Returns the versions that were expired by this call.
    pub fn record_rotation(
        &mut self,
        entry: RotationHistoryEntry,
        retained_versions: usize,
    ) -> Vec<KeyVersion> {
        let key_type = entry.key_type;

        if let Some(old_fingerprint) = &entry.old_fingerprint {
            let created_at = self
                .current
                .get(&key_type)
                .filter(|current| &current.fingerprint == old_fingerprint)
                .map_or(entry.rotation_date, |current| current.created_at);

            self.versions.entry(key_type).or_default().push(KeyVersion {
                key_type,
                fingerprint: old_fingerprint.clone(),
                status: KeyStatus::Rotated,
                created_at,
            });
        }

        let mut newly_expired = Vec::new();
        if let Some(list) = self.versions.get_mut(&key_type) {
            let overflow = list.len().saturating_sub(retained_versions);
            newly_expired = list.drain(..overflow).collect();
            for version in &mut newly_expired {
                version.status = KeyStatus::Expired;
            }
        }
        if !newly_expired.is_empty() {
            self.expired.entry(key_type).or_default().extend(newly_expired.iter().cloned());
        }

        self.current.insert(
            key_type,
            KeyVersion {
                key_type,
                fingerprint: entry.new_fingerprint.clone(),
                status: KeyStatus::Active,
                created_at: entry.rotation_date,
            },
        );
        self.rotation_history.push(entry);

        newly_expired
    }

    /// Date of the most recent rotation of `key_type`, if any.
    pub fn last_rotation(&self, key_type: KeyType) -> Option<DateTime<Utc>> {
        self.rotation_history
            .iter()
            .filter(|entry| entry.key_type == key_type)
            .map(|entry| entry.rotation_date)
            .max()
    }

    /// Retained rotated-out versions, oldest first.
    pub fn retained_versions(&self, key_type: KeyType) -> &[KeyVersion] {
        self.versions.get(&key_type).map_or(&[], Vec::as_slice)
    }

    pub fn expired_versions(&self, key_type: KeyType) -> &[KeyVersion] {
        self.expired.get(&key_type).map_or(&[], Vec::as_slice)
    }

    /// Every rotation of `key_type`, oldest first.
    pub fn history_for(&self, key_type: KeyType) -> impl Iterator<Item = &RotationHistoryEntry> {
        self.rotation_history.iter().filter(move |entry| entry.key_type == key_type)
    }

    /// The last `limit` rotations across all key types, oldest first.
    pub fn recent(&self, limit: usize) -> &[RotationHistoryEntry] {
        let start = self.rotation_history.len().saturating_sub(limit);
        &self.rotation_history[start..]
    }
}

/// Priority of an overdue rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Medium,
    High,
    Critical,
}

impl_domain_status_conversions!(Priority {
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleReason {
    /// The interval has elapsed since the last rotation.
    Overdue,
    /// No rotation has ever been recorded.
    InitialSetup,
}

/// A key type that is due for rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub key_type: KeyType,
    pub priority: Priority,
    pub reason: ScheduleReason,
    pub last_rotation: Option<DateTime<Utc>>,
    pub next_rotation: Option<DateTime<Utc>>,
    pub days_overdue: Option<i64>,
}

/// Outcome of one successful rotation. Carries fingerprints only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationResult {
    pub key_type: KeyType,
    pub old_fingerprint: Option<String>,
    pub new_fingerprint: String,
    pub rotated_at: DateTime<Utc>,
    pub reason: RotationReason,
    /// Versions pruned into the expired list by this rotation.
    pub expired_versions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RotationOutcome {
    Rotated(RotationResult),
    Failed { key_type: KeyType, error: String },
    /// Not attempted because the batch was cancelled first.
    Skipped { key_type: KeyType },
}

impl RotationOutcome {
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Rotated(result) => result.key_type,
            Self::Failed { key_type, .. } | Self::Skipped { key_type } => *key_type,
        }
    }
}

/// Where a pre-rotation backup landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupReceipt {
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Aggregate result of rotating every configured key type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationBatch {
    pub backup: BackupReceipt,
    pub outcomes: Vec<RotationOutcome>,
}

impl RotationBatch {
    pub fn rotated(&self) -> impl Iterator<Item = &RotationResult> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            RotationOutcome::Rotated(result) => Some(result),
            _ => None,
        })
    }

    pub fn failed_key_types(&self) -> Vec<KeyType> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, RotationOutcome::Failed { .. }))
            .map(RotationOutcome::key_type)
            .collect()
    }

    pub fn was_cancelled(&self) -> bool {
        self.outcomes.iter().any(|outcome| matches!(outcome, RotationOutcome::Skipped { .. }))
    }

    /// `RotationPartialFailure` listing every failed key type, if any.
    pub fn ensure_complete(&self) -> Result<()> {
        let failed = self.failed_key_types();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(AuditVaultError::RotationPartialFailure { failed })
        }
    }
}

/// Schedule, integrity and recent history merged for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationReport {
    pub generated_at: DateTime<Utc>,
    pub total_keys: usize,
    pub keys_needing_rotation: usize,
    pub integrity: BTreeMap<KeyType, bool>,
    pub schedule: Vec<ScheduleItem>,
    pub recent_history: Vec<RotationHistoryEntry>,
    pub recommendations: Vec<String>,
}
