//! Modular common utilities shared across AuditVault crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error types and classification
//! - `runtime`: AES-256-GCM and PBKDF2 primitives, zeroizing secret
//!   containers, fingerprints and the clock abstraction
//! - `test-utils`: pulls in `runtime` for dev-dependencies that need `MockClock`

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod crypto;

#[cfg(feature = "runtime")]
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use crypto::{DerivedKeyPair, EncryptionService, SealedBox};
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use security::SecureString;
#[cfg(feature = "runtime")]
pub use testing::{Clock, MockClock, SystemClock};
