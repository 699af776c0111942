//! Text and JSON rendering of command results

use std::collections::BTreeMap;

use auditvault_domain::{
    KeyType, RotationBatch, RotationOutcome, RotationReport, RotationResult, ScheduleItem,
    ScheduleReason,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Text
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn rotation_result(result: &RotationResult, format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        return print_json(result);
    }
    println!("{}", result_line(result));
    Ok(())
}

fn result_line(result: &RotationResult) -> String {
    format!(
        "rotated {}: {} -> {} ({}, {} version(s) expired)",
        result.key_type,
        result.old_fingerprint.as_deref().unwrap_or("none"),
        result.new_fingerprint,
        result.reason.as_str(),
        result.expired_versions
    )
}

pub fn rotation_batch(batch: &RotationBatch, format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        return print_json(batch);
    }

    println!("backup: {} ({} bytes)", batch.backup.location, batch.backup.size_bytes);
    for outcome in &batch.outcomes {
        match outcome {
            RotationOutcome::Rotated(result) => println!("{}", result_line(result)),
            RotationOutcome::Failed { key_type, error } => println!("FAILED {key_type}: {error}"),
            RotationOutcome::Skipped { key_type } => println!("skipped {key_type} (interrupted)"),
        }
    }
    Ok(())
}

pub fn schedule(items: &[ScheduleItem], format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        return print_json(items);
    }

    if items.is_empty() {
        println!("No key types are due for rotation.");
        return Ok(());
    }
    for item in items {
        println!("{}", schedule_line(item));
    }
    Ok(())
}

fn schedule_line(item: &ScheduleItem) -> String {
    match item.reason {
        ScheduleReason::InitialSetup => {
            format!("[{}] {}: never rotated", item.priority, item.key_type)
        }
        ScheduleReason::Overdue => format!(
            "[{}] {}: {} day(s) overdue, last rotated {}",
            item.priority,
            item.key_type,
            item.days_overdue.unwrap_or_default(),
            item.last_rotation.map(|at| at.to_rfc3339()).unwrap_or_default()
        ),
    }
}

pub fn integrity(results: &BTreeMap<KeyType, bool>, format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        return print_json(results);
    }
    for (key_type, valid) in results {
        println!("{key_type}: {}", if *valid { "ok" } else { "INVALID" });
    }
    Ok(())
}

pub fn report(report: &RotationReport, format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        return print_json(report);
    }

    println!("Key rotation report ({})", report.generated_at.to_rfc3339());
    println!(
        "{} of {} key type(s) need rotation",
        report.keys_needing_rotation, report.total_keys
    );

    println!("\nIntegrity:");
    integrity(&report.integrity, Format::Text)?;

    if !report.schedule.is_empty() {
        println!("\nSchedule:");
        for item in &report.schedule {
            println!("{}", schedule_line(item));
        }
    }

    if !report.recent_history.is_empty() {
        println!("\nRecent rotations:");
        for entry in &report.recent_history {
            println!(
                "{} {} {} -> {} ({})",
                entry.rotation_date.to_rfc3339(),
                entry.key_type,
                entry.old_fingerprint.as_deref().unwrap_or("none"),
                entry.new_fingerprint,
                entry.reason.as_str()
            );
        }
    }

    println!("\nRecommendations:");
    for line in &report.recommendations {
        println!("- {line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use auditvault_domain::{Priority, RotationReason};
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn lines_carry_fingerprints_only() {
        let result = RotationResult {
            key_type: KeyType::CsrfSecret,
            old_fingerprint: None,
            new_fingerprint: "0123456789abcdef".into(),
            rotated_at: Utc::now(),
            reason: RotationReason::Manual,
            expired_versions: 0,
        };
        assert_eq!(
            result_line(&result),
            "rotated csrf_secret: none -> 0123456789abcdef (manual_rotation, 0 version(s) expired)"
        );
    }

    #[test]
    fn overdue_line_shows_days_and_last_rotation() {
        let item = ScheduleItem {
            key_type: KeyType::JwtSecret,
            priority: Priority::Critical,
            reason: ScheduleReason::Overdue,
            last_rotation: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            next_rotation: None,
            days_overdue: Some(42),
        };
        assert_eq!(
            schedule_line(&item),
            "[critical] jwt_secret: 42 day(s) overdue, last rotated 2026-01-01T00:00:00+00:00"
        );
    }
}
