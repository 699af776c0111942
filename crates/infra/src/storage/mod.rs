//! File-backed implementations of the core storage ports

mod atomic;
pub mod backup;
pub mod env_file;
pub mod history;
pub mod master_secret;
pub mod wrapped_key;

pub use atomic::{write_atomic, PRIVATE_FILE_MODE};
pub use backup::{restore_backup, EncryptedBackupWriter};
pub use env_file::EnvFileSecretStore;
pub use history::JsonKeyHistoryStore;
pub use master_secret::FileMasterSecretStore;
pub use wrapped_key::FileWrappedKeyStore;
