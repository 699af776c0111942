//! Key acquisition: ports, tiers and the caching provider

pub mod ports;
pub mod provider;
pub mod tier;

pub use ports::{
    FallbackEvent, HsmClient, HsmConnector, HsmKeyHandle, KeyEventSink, MasterSecret,
    MasterSecretStore, TpmDevice, TpmHandle, TpmHierarchy, TracingKeyEventSink, WrappedKeyStore,
    WRAP_ALGORITHM,
};
pub use provider::{ChainedKeyProvider, KeyProvider};
pub use tier::{HsmTier, SoftwareTier, TierError, TpmTier};
