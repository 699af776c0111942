//! HSM adapters

pub mod rest;

pub use rest::{RestHsmClient, RestHsmConnector};
