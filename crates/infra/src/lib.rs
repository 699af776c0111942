//! # AuditVault Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - File-backed secret, history, backup, master-secret and wrapped-key stores
//! - The REST HSM client
//! - The cross-process rotation lock
//! - Configuration loading and logging setup
//!
//! ## Architecture
//! - Implements traits defined in `auditvault-core`
//! - Contains all "impure" code (filesystem, HTTP, process environment)

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod hsm;
pub mod logging;
pub mod rotation_lock;
pub mod storage;

// Re-export commonly used items
pub use bootstrap::AppContext;
pub use hsm::{RestHsmClient, RestHsmConnector};
pub use logging::init_tracing;
pub use rotation_lock::RotationLock;
pub use storage::*;
