//! Secret rotation: ports, secret helpers and the rotation manager

pub mod manager;
pub mod ports;
pub mod secrets;

pub use manager::RotationManager;
pub use ports::{BackupSink, KeyHistoryStore, SecretStore};
