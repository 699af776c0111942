//! Rotation, scheduling and integrity checks for long-lived secrets

use std::collections::BTreeMap;
use std::sync::Arc;

use auditvault_common::{Clock, SystemClock};
use auditvault_domain::constants::{CRITICAL_OVERDUE_DAYS, HIGH_OVERDUE_DAYS};
use auditvault_domain::{
    AuditVaultError, KeyType, Priority, Result, RotationBatch, RotationConfig,
    RotationHistoryEntry, RotationOutcome, RotationPolicies, RotationReason, RotationReport,
    RotationResult, ScheduleItem, ScheduleReason,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::ports::{BackupSink, KeyHistoryStore, SecretStore};
use super::secrets;
use crate::keys::KeyProvider;

/// Rotates the secrets in a [`SecretStore`] and keeps their history.
///
/// `rotate` and `rotate_all` are serialized through an internal async mutex.
/// Cross-process exclusion is the caller's job.
pub struct RotationManager {
    secrets: Arc<dyn SecretStore>,
    history: Arc<dyn KeyHistoryStore>,
    backups: Arc<dyn BackupSink>,
    keys: Option<Arc<dyn KeyProvider>>,
    policies: RotationPolicies,
    history_report_limit: usize,
    clock: Arc<dyn Clock>,
    rotation_guard: Mutex<()>,
}

impl RotationManager {
    pub fn new(
        config: &RotationConfig,
        secrets: Arc<dyn SecretStore>,
        history: Arc<dyn KeyHistoryStore>,
        backups: Arc<dyn BackupSink>,
    ) -> Self {
        Self {
            secrets,
            history,
            backups,
            keys: None,
            policies: config.policies.clone(),
            history_report_limit: config.history_report_limit,
            clock: Arc::new(SystemClock),
            rotation_guard: Mutex::new(()),
        }
    }

    /// Provider whose cache is dropped after `encryption_key` rotates.
    pub fn with_key_provider(mut self, keys: Arc<dyn KeyProvider>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policies(&self) -> &RotationPolicies {
        &self.policies
    }

    /// Rotate one key type as part of the regular schedule.
    pub async fn rotate(&self, key_type: KeyType) -> Result<RotationResult> {
        self.rotate_with_reason(key_type, RotationReason::Scheduled).await
    }

    pub async fn rotate_with_reason(
        &self,
        key_type: KeyType,
        reason: RotationReason,
    ) -> Result<RotationResult> {
        let _guard = self.rotation_guard.lock().await;
        self.rotate_locked(key_type, reason).await
    }

    /// Back up the store, then rotate every key type.
    pub async fn rotate_all(&self) -> Result<RotationBatch> {
        self.rotate_all_with_cancel(&CancellationToken::new()).await
    }

    /// [`RotationManager::rotate_all`] that stops starting new key types once
    /// `cancel` fires. A rotation already underway always completes.
    ///
    /// Fails before touching any secret if the store is missing or the
    /// backup cannot be written. Per-type failures are reported in the batch.
    #[instrument(skip_all)]
    pub async fn rotate_all_with_cancel(&self, cancel: &CancellationToken) -> Result<RotationBatch> {
        let _guard = self.rotation_guard.lock().await;

        let contents = self.secrets.snapshot().await?.ok_or_else(|| {
            AuditVaultError::NotFound("secret store does not exist; nothing to back up".into())
        })?;
        let backup = self.backups.write_backup(&contents, self.clock.utc_now()).await?;
        drop(contents);
        info!(location = %backup.location, "rotation.backup_created");

        let mut outcomes = Vec::with_capacity(KeyType::ALL.len());
        for key_type in KeyType::ALL {
            if cancel.is_cancelled() {
                outcomes.push(RotationOutcome::Skipped { key_type });
                continue;
            }

            match self.rotate_locked(key_type, RotationReason::Scheduled).await {
                Ok(result) => outcomes.push(RotationOutcome::Rotated(result)),
                Err(err) => {
                    error!(key_type = key_type.as_str(), error = %err, "rotation.failed");
                    outcomes.push(RotationOutcome::Failed { key_type, error: err.to_string() });
                }
            }
        }

        let batch = RotationBatch { backup, outcomes };
        info!(
            rotated = batch.rotated().count(),
            failed = batch.failed_key_types().len(),
            cancelled = batch.was_cancelled(),
            "rotation.batch_completed"
        );
        Ok(batch)
    }

    #[instrument(skip_all, fields(key_type = key_type.as_str(), reason = reason.as_str()))]
    async fn rotate_locked(
        &self,
        key_type: KeyType,
        reason: RotationReason,
    ) -> Result<RotationResult> {
        let policy = self.policies.get(key_type);

        let old_fingerprint = self.secrets.read(key_type).await?.map(|old| secrets::fingerprint(&old));
        let new_secret = secrets::generate_secret(policy);
        let new_fingerprint = secrets::fingerprint(&new_secret);
        let rotated_at = self.clock.utc_now();

        // The new secret goes live first; a history failure after this point
        // leaves a rotated store with a stale log rather than the reverse.
        self.secrets.write(key_type, &new_secret).await?;
        drop(new_secret);

        let mut history = self.history.load().await?;
        let expired = history.record_rotation(
            RotationHistoryEntry {
                key_type,
                rotation_date: rotated_at,
                old_fingerprint: old_fingerprint.clone(),
                new_fingerprint: new_fingerprint.clone(),
                reason,
            },
            policy.retained_versions,
        );
        if let Err(err) = self.history.save(&history).await {
            error!(error = %err, "rotation.history_save_failed");
            return Err(err);
        }

        if key_type == KeyType::EncryptionKey {
            if let Some(keys) = &self.keys {
                keys.invalidate();
            }
        }

        info!(
            old_fingerprint = old_fingerprint.as_deref().unwrap_or("none"),
            new_fingerprint = %new_fingerprint,
            reason = reason.as_str(),
            expired_versions = expired.len(),
            "rotation.completed"
        );

        Ok(RotationResult {
            key_type,
            old_fingerprint,
            new_fingerprint,
            rotated_at,
            reason,
            expired_versions: expired.len(),
        })
    }

    /// Key types that are due, most urgent first.
    pub async fn check_schedule(&self) -> Result<Vec<ScheduleItem>> {
        let history = self.history.load().await?;
        let now = self.clock.utc_now();

        let mut items = Vec::new();
        for key_type in KeyType::ALL {
            let policy = self.policies.get(key_type);
            let Some(last_rotation) = history.last_rotation(key_type) else {
                items.push(ScheduleItem {
                    key_type,
                    priority: Priority::High,
                    reason: ScheduleReason::InitialSetup,
                    last_rotation: None,
                    next_rotation: None,
                    days_overdue: None,
                });
                continue;
            };

            let next_rotation = last_rotation + policy.interval();
            if now < next_rotation {
                continue;
            }

            let days_overdue = (now - next_rotation).num_days();
            items.push(ScheduleItem {
                key_type,
                priority: priority_for(days_overdue),
                reason: ScheduleReason::Overdue,
                last_rotation: Some(last_rotation),
                next_rotation: Some(next_rotation),
                days_overdue: Some(days_overdue),
            });
        }

        items.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(items)
    }

    /// Validity of each stored secret. Values are never logged or compared.
    pub async fn verify_integrity(&self) -> Result<BTreeMap<KeyType, bool>> {
        let mut results = BTreeMap::new();
        for key_type in KeyType::ALL {
            let policy = self.policies.get(key_type);
            let valid = match self.secrets.read(key_type).await? {
                Some(value) => secrets::satisfies_policy(&value, policy),
                None => false,
            };
            if !valid {
                warn!(key_type = key_type.as_str(), "rotation.integrity_check_failed");
            }
            results.insert(key_type, valid);
        }
        Ok(results)
    }

    /// [`RotationManager::verify_integrity`], failing with
    /// `IntegrityViolation` when any key type is invalid.
    pub async fn ensure_integrity(&self) -> Result<BTreeMap<KeyType, bool>> {
        let results = self.verify_integrity().await?;
        let key_types: Vec<KeyType> =
            results.iter().filter(|(_, valid)| !**valid).map(|(key_type, _)| *key_type).collect();

        if key_types.is_empty() {
            Ok(results)
        } else {
            Err(AuditVaultError::IntegrityViolation { key_types })
        }
    }

    /// Schedule, integrity and recent history in one document.
    pub async fn generate_report(&self) -> Result<RotationReport> {
        let schedule = self.check_schedule().await?;
        let integrity = self.verify_integrity().await?;
        let history = self.history.load().await?;

        let recommendations = recommendations(&schedule, &integrity);
        Ok(RotationReport {
            generated_at: self.clock.utc_now(),
            total_keys: KeyType::ALL.len(),
            keys_needing_rotation: schedule.len(),
            integrity,
            recent_history: history.recent(self.history_report_limit).to_vec(),
            schedule,
            recommendations,
        })
    }
}

fn priority_for(days_overdue: i64) -> Priority {
    if days_overdue > CRITICAL_OVERDUE_DAYS {
        Priority::Critical
    } else if days_overdue > HIGH_OVERDUE_DAYS {
        Priority::High
    } else {
        Priority::Medium
    }
}

fn recommendations(schedule: &[ScheduleItem], integrity: &BTreeMap<KeyType, bool>) -> Vec<String> {
    let mut out: Vec<String> = integrity
        .iter()
        .filter(|(_, valid)| !**valid)
        .map(|(key_type, _)| {
            format!("Rotate {key_type} immediately: the stored value fails integrity checks")
        })
        .collect();

    for item in schedule {
        let key_type = item.key_type;
        let line = match (item.reason, item.priority) {
            (ScheduleReason::InitialSetup, _) => {
                format!("{key_type} has no rotation history; perform an initial rotation")
            }
            (ScheduleReason::Overdue, Priority::Critical) => format!(
                "{key_type} is {} days overdue; rotate immediately",
                item.days_overdue.unwrap_or_default()
            ),
            (ScheduleReason::Overdue, Priority::High) => format!(
                "{key_type} is {} days overdue; rotate within the week",
                item.days_overdue.unwrap_or_default()
            ),
            (ScheduleReason::Overdue, Priority::Medium) => {
                format!("{key_type} is due for rotation")
            }
        };
        out.push(line);
    }

    if out.is_empty() {
        out.push("All keys are within their rotation policy".to_string());
    }
    out
}
