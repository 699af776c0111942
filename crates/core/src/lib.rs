//! # AuditVault Core
//!
//! Business logic for audit-log field encryption and secret rotation.
//!
//! This crate contains:
//! - Port interfaces (traits) for the HSM, TPM and every persistent store
//! - The caching key provider with its HSM, TPM and software tiers
//! - The field cipher, record migration and content fingerprinting
//! - The rotation manager
//! - Crypto latency and usage instrumentation
//!
//! ## Architecture Principles
//! - Only depends on `auditvault-common` and `auditvault-domain`
//! - No filesystem, HTTP or platform code
//! - All external dependencies via traits

pub mod cipher;
pub mod instrumentation;
pub mod keys;
pub mod rotation;

pub use cipher::{content_fingerprint, migrate_records, FieldCipher, MigrationReport, PlainFields};
pub use instrumentation::{CryptoMetrics, MetricsSnapshot};
pub use keys::{
    ChainedKeyProvider, FallbackEvent, HsmClient, HsmConnector, HsmTier, KeyEventSink,
    KeyProvider, MasterSecret, MasterSecretStore, TierError, TpmDevice, TracingKeyEventSink,
    WrappedKeyStore,
};
pub use rotation::{BackupSink, KeyHistoryStore, RotationManager, SecretStore};
