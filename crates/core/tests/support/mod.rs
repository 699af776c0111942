//! Shared test helpers for `auditvault-core` integration tests.
//!
//! These helpers provide in-memory ports and scriptable HSM/TPM fakes so the
//! key provider, field cipher and rotation tests can focus on behaviour
//! instead of boilerplate.

#![allow(dead_code)]

pub mod devices;
pub mod repositories;
