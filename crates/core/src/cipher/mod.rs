//! Field-level encryption of sensitive record fields

pub mod field_cipher;
pub mod fingerprint;
pub mod migration;

pub use field_cipher::{FieldCipher, PlainFields};
pub use fingerprint::content_fingerprint;
pub use migration::{migrate_records, MigrationReport};
