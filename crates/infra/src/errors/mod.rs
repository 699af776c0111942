//! Conversions from external infrastructure errors into domain and tier
//! errors.

mod conversions;

pub use conversions::{InfraError, IntoTierError};
