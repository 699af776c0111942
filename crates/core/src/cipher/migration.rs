//! One-off encryption of records written before field encryption existed

use auditvault_domain::constants::DEFAULT_MIGRATION_BATCH_SIZE;
use auditvault_domain::SensitiveRecord;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::field_cipher::FieldCipher;

/// Outcome counts of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub total: usize,
    pub encrypted: usize,
    /// Already encrypted, or no sensitive field had a value.
    pub skipped: usize,
    pub failed: usize,
    /// `(record_id, error)` for each failed record.
    pub failures: Vec<(String, String)>,
}

/// Encrypt every sensitive field of each record that has none encrypted yet.
///
/// A failing record is counted and logged; the remaining records are still
/// processed. A `batch_size` of zero uses the default of 100.
pub async fn migrate_records<R: SensitiveRecord>(
    cipher: &FieldCipher,
    records: &mut [R],
    batch_size: usize,
) -> MigrationReport {
    let batch_size = if batch_size == 0 { DEFAULT_MIGRATION_BATCH_SIZE } else { batch_size };
    let field_names = R::field_names();
    let mut report = MigrationReport { total: records.len(), ..MigrationReport::default() };

    for (batch_index, batch) in records.chunks_mut(batch_size).enumerate() {
        for record in batch.iter_mut() {
            if record.has_encrypted_fields() {
                report.skipped += 1;
                continue;
            }

            match cipher.encrypt_fields(record, &field_names).await {
                Ok(sealed) if sealed.is_empty() => report.skipped += 1,
                Ok(_) => report.encrypted += 1,
                Err(err) => {
                    let record_id = record.record_id();
                    warn!(record_id = %record_id, error = %err, "migration.record_failed");
                    report.failed += 1;
                    report.failures.push((record_id, err.to_string()));
                }
            }
        }

        info!(
            batch = batch_index + 1,
            processed = (batch_index * batch_size + batch.len()).min(report.total),
            total = report.total,
            "migration.batch_completed"
        );
    }

    info!(
        total = report.total,
        encrypted = report.encrypted,
        skipped = report.skipped,
        failed = report.failed,
        "migration.completed"
    );
    report
}
