//! Domain constants
//!
//! Defaults for key acquisition, rotation and instrumentation.

// Key acquisition
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_HSM_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HSM_OP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HSM_KEY_NAME: &str = "audit-log-encryption-key";
pub const DEFAULT_HSM_TOKEN_ENV: &str = "AUDITVAULT_HSM_TOKEN";
pub const DEFAULT_MASTER_SECRET_ENV: &str = "FALLBACK_MASTER_SECRET";
pub const DEFAULT_MASTER_SECRET_PATH: &str = ".auditvault_master.json";
pub const DEFAULT_WRAPPED_KEY_PATH: &str = ".auditvault_wrapped_keys.json";
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 310_000;
pub const MIN_PBKDF2_ITERATIONS: u32 = 310_000;
pub const SOFTWARE_SALT_LEN: usize = 32;
pub const MASTER_SECRET_LEN: usize = 32;
pub const DATA_KEY_LEN: usize = 32;

// Rotation
pub const DEFAULT_SECRET_STORE_PATH: &str = ".env";
pub const DEFAULT_HISTORY_PATH: &str = ".key_store.json";
pub const DEFAULT_BACKUP_DIR: &str = "backups/keys";
pub const DEFAULT_BACKUP_PASSWORD_ENV: &str = "BACKUP_MASTER_PASSWORD";
pub const DEFAULT_LOCK_PATH: &str = ".key_rotation.lock";
pub const DEFAULT_HISTORY_REPORT_LIMIT: usize = 10;
pub const BACKUP_SALT_LEN: usize = 16;
pub const BACKUP_FORMAT_VERSION: u32 = 1;
pub const MIN_KEY_LENGTH: usize = 16;

// Schedule priority thresholds (days overdue)
pub const CRITICAL_OVERDUE_DAYS: i64 = 30;
pub const HIGH_OVERDUE_DAYS: i64 = 7;

// Instrumentation
pub const DEFAULT_SLOW_OPERATION_THRESHOLD_MS: u64 = 200;

// Record migration
pub const DEFAULT_MIGRATION_BATCH_SIZE: usize = 100;
