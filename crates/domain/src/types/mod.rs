//! Domain types and models

pub mod key;
pub mod record;
pub mod rotation;

pub use key::{KeySource, KeyType, SecretEncoding, SecretMaterial};
pub use record::{FieldDescriptor, SealedFields, SecurityEvent, SensitiveRecord};
pub use rotation::{
    BackupReceipt, KeyHistory, KeyStatus, KeyVersion, Priority, RotationBatch,
    RotationHistoryEntry, RotationOutcome, RotationPolicy, RotationReason, RotationReport,
    RotationResult, ScheduleItem, ScheduleReason,
};
