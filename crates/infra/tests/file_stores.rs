//! Integration tests for the file-backed stores.

use std::fs;

use auditvault_common::SecureString;
use auditvault_core::{KeyHistoryStore, MasterSecretStore, SecretStore, WrappedKeyStore};
use auditvault_domain::{KeyHistory, KeyType, RotationHistoryEntry, RotationReason};
use auditvault_infra::{
    EnvFileSecretStore, FileMasterSecretStore, FileWrappedKeyStore, JsonKeyHistoryStore,
};
use chrono::Utc;

const ENV_FILE: &str = "# application secrets\nJWT_SECRET=\"jwt-old\"\n\n# session\nSESSION_SECRET=session-old\nDATABASE_URL=postgres://localhost/app\n";

/// Validates `EnvFileSecretStore` for the rotate-in-place scenario.
///
/// Assertions:
/// - Reads strip quotes.
/// - A write replaces only the owned line and preserves everything else.
/// - A secret missing from the file is appended.
#[tokio::test]
async fn env_file_store_rewrites_only_owned_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    fs::write(&path, ENV_FILE).unwrap();
    let store = EnvFileSecretStore::new(&path).without_env_fallback();

    assert_eq!(store.read(KeyType::JwtSecret).await.unwrap().unwrap().expose(), "jwt-old");
    assert!(store.read(KeyType::CsrfSecret).await.unwrap().is_none());

    store.write(KeyType::JwtSecret, &SecureString::from("jwt-new")).await.unwrap();
    store.write(KeyType::CsrfSecret, &SecureString::from("csrf-new")).await.unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(
        contents,
        "# application secrets\nJWT_SECRET=jwt-new\n\n# session\nSESSION_SECRET=session-old\nDATABASE_URL=postgres://localhost/app\nCSRF_SECRET=csrf-new\n"
    );
    assert_eq!(store.read(KeyType::CsrfSecret).await.unwrap().unwrap().expose(), "csrf-new");
}

#[tokio::test]
async fn env_file_store_snapshot_reflects_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    let store = EnvFileSecretStore::new(&path);

    assert!(store.snapshot().await.unwrap().is_none());

    fs::write(&path, ENV_FILE).unwrap();
    let snapshot = store.snapshot().await.unwrap().unwrap();
    assert_eq!(&snapshot[..], ENV_FILE.as_bytes());
}

#[tokio::test]
async fn env_file_store_falls_back_to_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    fs::write(&path, "JWT_SECRET=from-file\n").unwrap();

    // Only ENCRYPTION_KEY is absent from the file.
    std::env::set_var("ENCRYPTION_KEY", "from-environment");
    let store = EnvFileSecretStore::new(&path);
    let value = store.read(KeyType::EncryptionKey).await.unwrap();
    std::env::remove_var("ENCRYPTION_KEY");

    assert_eq!(value.unwrap().expose(), "from-environment");
    assert_eq!(store.read(KeyType::JwtSecret).await.unwrap().unwrap().expose(), "from-file");
}

#[tokio::test]
async fn history_store_round_trips_and_tolerates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonKeyHistoryStore::new(dir.path().join(".key_store.json"));
    assert_eq!(store.load().await.unwrap(), KeyHistory::default());

    let mut history = KeyHistory::default();
    history.record_rotation(
        RotationHistoryEntry {
            key_type: KeyType::SessionSecret,
            rotation_date: Utc::now(),
            old_fingerprint: Some("0123456789abcdef".into()),
            new_fingerprint: "fedcba9876543210".into(),
            reason: RotationReason::Manual,
        },
        3,
    );
    store.save(&history).await.unwrap();

    assert_eq!(store.load().await.unwrap(), history);
    let raw = fs::read_to_string(dir.path().join(".key_store.json")).unwrap();
    assert!(raw.contains("\"manual_rotation\""));
    assert!(raw.contains("\"session_secret\""));
}

#[tokio::test]
async fn history_store_reports_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".key_store.json");
    fs::write(&path, "{ not json").unwrap();

    let err = JsonKeyHistoryStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err, auditvault_domain::AuditVaultError::Serialization(_)));
}

/// Validates `FileMasterSecretStore` for the first-use scenario.
///
/// Assertions:
/// - A 32-byte secret and 32-byte salt are generated and persisted.
/// - Later loads return the same secret and salt.
#[tokio::test]
async fn master_secret_is_provisioned_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("master.json");
    let store = FileMasterSecretStore::new("AUDITVAULT_TEST_UNSET_MASTER", &path);

    let first = store.load_or_provision().await.unwrap();
    let second = store.load_or_provision().await.unwrap();

    assert_eq!(first.secret.len(), 32);
    assert_eq!(first.salt.len(), 32);
    assert_eq!(&first.secret[..], &second.secret[..]);
    assert_eq!(first.salt, second.salt);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}

#[tokio::test]
async fn master_secret_env_var_wins_and_only_salt_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("master.json");
    let env_var = "AUDITVAULT_TEST_MASTER_FROM_ENV";
    std::env::set_var(env_var, "ab".repeat(32));

    let store = FileMasterSecretStore::new(env_var, &path);
    let master = store.load_or_provision().await.unwrap();
    std::env::remove_var(env_var);

    assert_eq!(&master.secret[..], &[0xab; 32][..]);
    let persisted = fs::read_to_string(&path).unwrap();
    assert!(persisted.contains("salt"));
    assert!(!persisted.contains("secret"));
}

#[tokio::test]
async fn master_secret_rejects_short_env_value() {
    let dir = tempfile::tempdir().unwrap();
    let env_var = "AUDITVAULT_TEST_MASTER_SHORT";
    std::env::set_var(env_var, "abcd");

    let store = FileMasterSecretStore::new(env_var, dir.path().join("master.json"));
    let result = store.load_or_provision().await;
    std::env::remove_var(env_var);

    assert!(matches!(result, Err(auditvault_domain::AuditVaultError::Misconfigured(_))));
}

#[tokio::test]
async fn wrapped_key_store_keeps_keys_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileWrappedKeyStore::new(dir.path().join("wrapped.json"));

    assert!(store.load("audit-log-encryption-key").await.unwrap().is_none());
    store.store("audit-log-encryption-key", &[1, 2, 3]).await.unwrap();
    store.store("legacy-key", &[9]).await.unwrap();

    assert_eq!(store.load("audit-log-encryption-key").await.unwrap(), Some(vec![1, 2, 3]));
    assert_eq!(store.load("legacy-key").await.unwrap(), Some(vec![9]));
}
