//! # AuditVault Domain
//!
//! Data types and models for audit-log field encryption and secret rotation.
//!
//! This crate contains:
//! - Key material and key-source types
//! - Rotation policy, history and report types
//! - The sensitive-record contract consumed by the field cipher
//! - Configuration structures
//! - The domain error taxonomy and Result alias
//!
//! ## Architecture
//! - Depends only on the foundation tier of `auditvault-common`
//! - No I/O, no async, no cryptography

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
