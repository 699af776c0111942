//! Integration tests for encrypted secret-store backups.

use std::fs;

use auditvault_common::SecureString;
use auditvault_core::BackupSink;
use auditvault_domain::AuditVaultError;
use auditvault_infra::{restore_backup, EncryptedBackupWriter};
use chrono::{TimeZone, Utc};

const CONTENTS: &[u8] = b"JWT_SECRET=abc\nSESSION_SECRET=def\n";

/// Validates `EncryptedBackupWriter` and `restore_backup` for the recovery
/// scenario.
///
/// Assertions:
/// - The artifact name carries the creation timestamp.
/// - Restoring with the same password yields the original bytes.
/// - The artifact does not contain the plaintext.
#[tokio::test]
async fn backup_restores_with_the_same_password() {
    let dir = tempfile::tempdir().unwrap();
    let env_var = "AUDITVAULT_TEST_BACKUP_PASSWORD_OK";
    std::env::set_var(env_var, "correct horse battery staple");

    let writer = EncryptedBackupWriter::new(dir.path().join("backups"), env_var);
    let created_at = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
    let receipt = writer.write_backup(CONTENTS, created_at).await.unwrap();

    assert!(receipt.location.ends_with("keys_backup_20260314_150926.enc"));
    assert_eq!(receipt.created_at, created_at);

    let raw = fs::read_to_string(&receipt.location).unwrap();
    assert!(!raw.contains("JWT_SECRET"));
    assert!(raw.contains("\"version\": 1"));

    let restored = restore_backup(
        std::path::Path::new(&receipt.location),
        &SecureString::from("correct horse battery staple"),
    )
    .unwrap();
    std::env::remove_var(env_var);
    assert_eq!(&restored[..], CONTENTS);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&receipt.location).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}

#[tokio::test]
async fn backups_in_the_same_second_do_not_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let env_var = "AUDITVAULT_TEST_BACKUP_PASSWORD_COLLIDE";
    std::env::set_var(env_var, "pw");

    let writer = EncryptedBackupWriter::new(dir.path(), env_var);
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let first = writer.write_backup(b"first", created_at).await.unwrap();
    let second = writer.write_backup(b"second", created_at).await.unwrap();
    std::env::remove_var(env_var);

    assert_ne!(first.location, second.location);
    assert!(second.location.ends_with("keys_backup_20260101_000000_1.enc"));
}

#[tokio::test]
async fn wrong_password_is_a_decryption_error() {
    let dir = tempfile::tempdir().unwrap();
    let env_var = "AUDITVAULT_TEST_BACKUP_PASSWORD_WRONG";
    std::env::set_var(env_var, "right");

    let writer = EncryptedBackupWriter::new(dir.path(), env_var);
    let receipt = writer.write_backup(CONTENTS, Utc::now()).await.unwrap();
    std::env::remove_var(env_var);

    let err = restore_backup(std::path::Path::new(&receipt.location), &SecureString::from("wrong"))
        .unwrap_err();
    assert!(matches!(err, AuditVaultError::Decryption(_)));
}

#[tokio::test]
async fn missing_password_is_misconfigured_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let writer = EncryptedBackupWriter::new(dir.path(), "AUDITVAULT_TEST_BACKUP_PASSWORD_UNSET");

    let err = writer.write_backup(CONTENTS, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AuditVaultError::Misconfigured(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
