//! Integration tests for the chained key provider.

mod support;

use std::sync::Arc;
use std::time::Duration;

use auditvault_common::MockClock;
use auditvault_core::keys::{ChainedKeyProvider, HsmTier, KeyProvider};
use auditvault_core::CryptoMetrics;
use auditvault_domain::{AuditVaultError, HsmConfig, KeyProviderConfig, KeySource};
use support::devices::{
    BrokenMasterSecret, HsmMode, MockHsm, MockTpm, RecordingEventSink, StaticMasterSecret,
};
use support::repositories::MockWrappedKeyStore;

const TPM_KEY: [u8; 32] = [0x42; 32];

struct Harness {
    hsm: Arc<MockHsm>,
    tpm: Arc<MockTpm>,
    events: Arc<RecordingEventSink>,
    wrapped: Arc<MockWrappedKeyStore>,
    metrics: Arc<CryptoMetrics>,
    clock: MockClock,
    provider: ChainedKeyProvider,
}

fn harness(hsm_mode: HsmMode, tpm: Arc<MockTpm>) -> Harness {
    let hsm = MockHsm::new(hsm_mode);
    let events = Arc::new(RecordingEventSink::default());
    let wrapped = Arc::new(MockWrappedKeyStore::default());
    let metrics = Arc::new(CryptoMetrics::default());
    let clock = MockClock::new();

    let config = KeyProviderConfig::default();
    let provider = ChainedKeyProvider::new(&config, StaticMasterSecret::new(&[7u8; 32], &[1u8; 32]))
        .with_hsm(HsmTier::new(hsm.clone(), wrapped.clone(), &HsmConfig::new("https://hsm.test")))
        .with_tpm(tpm.clone())
        .with_event_sink(events.clone())
        .with_metrics(metrics.clone())
        .with_clock(Arc::new(clock.clone()));

    Harness { hsm, tpm, events, wrapped, metrics, clock, provider }
}

/// Validates the full fallback scenario.
///
/// Assertions:
/// - With the HSM unreachable and no TPM, a software key is returned.
/// - Exactly one fallback event is emitted, tagged `software`.
#[tokio::test]
async fn falls_back_to_software_when_hsm_and_tpm_fail() {
    let h = harness(HsmMode::Unreachable, MockTpm::unavailable());

    let material = h.provider.get_key().await.unwrap();
    assert_eq!(material.source(), KeySource::Software);
    assert!(material.mac_key().is_some());

    let events = h.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, KeySource::Software);
    assert!(events[0].reason.contains("hsm:"));
    assert!(events[0].reason.contains("tpm:"));

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.failed_operations, 2);
    assert_eq!(snapshot.fallback_usage_count, 1);
    assert_eq!(snapshot.hsm_usage_count, 0);
}

/// Validates the HSM connect timeout scenario.
///
/// Assertions:
/// - A hanging connect is abandoned after the connect timeout.
/// - The TPM key is served and tagged `tpm`.
#[tokio::test(start_paused = true)]
async fn hanging_hsm_connect_times_out_to_tpm() {
    let h = harness(HsmMode::Hang, MockTpm::available(TPM_KEY));

    let material = h.provider.get_key().await.unwrap();
    assert_eq!(material.source(), KeySource::Tpm);
    assert_eq!(material.encryption_key(), &TPM_KEY);

    let events = h.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, KeySource::Tpm);
    assert!(events[0].reason.contains("hsm.connect timed out"));
}

/// Validates the stalled HSM operation scenario.
///
/// Assertions:
/// - A `get_key` that never answers is bounded by the op timeout.
#[tokio::test(start_paused = true)]
async fn stalled_hsm_operation_times_out() {
    let h = harness(HsmMode::StallOnGetKey, MockTpm::available(TPM_KEY));

    let material = h.provider.get_key().await.unwrap();
    assert_eq!(material.source(), KeySource::Tpm);
    assert!(h.events.events()[0].reason.contains("hsm.unwrap_key timed out"));
}

/// Validates the cache TTL scenario.
///
/// Assertions:
/// - Two calls inside the TTL make one remote HSM call.
/// - A call after TTL + 1s makes a second remote call and returns the same
///   unwrapped key.
#[tokio::test]
async fn cache_ttl_bounds_remote_calls() {
    let h = harness(HsmMode::Healthy, MockTpm::unavailable());

    let first = h.provider.get_key().await.unwrap();
    h.clock.advance(Duration::from_secs(120));
    let second = h.provider.get_key().await.unwrap();

    assert_eq!(first.source(), KeySource::Hsm);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(h.hsm.remote_calls(), 1);

    h.clock.advance(Duration::from_secs(181));
    let third = h.provider.get_key().await.unwrap();

    assert_eq!(h.hsm.remote_calls(), 2);
    assert_eq!(h.hsm.connects(), 1);
    assert_eq!(third.encryption_key(), first.encryption_key());
    assert!(h.events.events().is_empty());
}

/// Validates the first-use envelope scenario.
///
/// Assertions:
/// - The first acquisition wraps and persists a new data key.
/// - Later acquisitions unwrap it instead of generating another.
#[tokio::test]
async fn data_key_is_wrapped_once_then_unwrapped() {
    let h = harness(HsmMode::Healthy, MockTpm::unavailable());

    h.provider.get_key().await.unwrap();
    assert_eq!(h.hsm.encrypt_calls(), 1);
    assert!(h.wrapped.stored("audit-log-encryption-key").is_some());

    h.provider.invalidate();
    h.provider.get_key().await.unwrap();
    assert_eq!(h.hsm.encrypt_calls(), 1);
    assert_eq!(h.hsm.decrypt_calls(), 1);
    assert_eq!(h.metrics.snapshot().hsm_usage_count, 2);
}

/// Validates `KeyProvider::invalidate` behavior.
///
/// Assertions:
/// - The next call re-runs the chain even inside the TTL.
#[tokio::test]
async fn invalidate_forces_reacquisition() {
    let h = harness(HsmMode::Healthy, MockTpm::unavailable());

    h.provider.get_key().await.unwrap();
    h.provider.invalidate();
    h.provider.get_key().await.unwrap();

    assert_eq!(h.hsm.remote_calls(), 2);
}

/// Validates the cold-cache concurrency scenario.
///
/// Assertions:
/// - Concurrent callers share one connection and one acquisition.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_acquire_once() {
    let h = harness(HsmMode::Healthy, MockTpm::unavailable());
    let provider = Arc::new(h.provider);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move { provider.get_key().await.unwrap() })
        })
        .collect();

    let mut keys = Vec::new();
    for handle in handles {
        keys.push(handle.await.unwrap());
    }

    assert_eq!(h.hsm.connects(), 1);
    assert_eq!(h.hsm.remote_calls(), 1);
    assert!(keys.iter().all(|key| Arc::ptr_eq(key, &keys[0])));
}

/// Validates the TPM handle reuse scenario.
///
/// Assertions:
/// - The primary object is created once and unsealed per acquisition.
#[tokio::test]
async fn tpm_primary_is_created_once() {
    let h = harness(HsmMode::Unreachable, MockTpm::available(TPM_KEY));

    h.provider.get_key().await.unwrap();
    h.provider.invalidate();
    h.provider.get_key().await.unwrap();

    assert_eq!(h.tpm.primaries(), 1);
    assert_eq!(h.tpm.unseals(), 2);
    assert_eq!(h.events.events().len(), 2);
}

/// Validates software derivation determinism.
///
/// Assertions:
/// - The same master secret and salt yield the same key across
///   acquisitions, so earlier ciphertext stays readable.
#[tokio::test]
async fn software_key_is_stable_across_acquisitions() {
    let master = StaticMasterSecret::new(&[9u8; 32], &[3u8; 32]);
    let provider = ChainedKeyProvider::new(&KeyProviderConfig::default(), master.clone());

    let first = provider.get_key().await.unwrap();
    provider.invalidate();
    let second = provider.get_key().await.unwrap();

    assert_eq!(first.encryption_key(), second.encryption_key());
    assert_ne!(first.encryption_key(), first.mac_key().unwrap());
    assert_eq!(master.loads(), 2);
}

/// Validates the exhausted chain scenario.
///
/// Assertions:
/// - When the software tier cannot load its master secret the provider
///   returns `KeyUnavailable` naming every tier.
#[tokio::test]
async fn exhausted_chain_is_key_unavailable() {
    let provider =
        ChainedKeyProvider::new(&KeyProviderConfig::default(), Arc::new(BrokenMasterSecret))
            .with_tpm(MockTpm::unavailable());

    let err = provider.get_key().await.unwrap_err();
    match err {
        AuditVaultError::KeyUnavailable(reason) => {
            assert!(reason.contains("hsm: not configured"));
            assert!(reason.contains("tpm:"));
            assert!(reason.contains("software:"));
        }
        other => panic!("expected KeyUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn lists_hsm_keys_for_diagnostics() {
    let h = harness(HsmMode::Healthy, MockTpm::unavailable());
    let keys = h.provider.list_hsm_keys().await.unwrap();
    assert!(keys.contains(&"audit-log-encryption-key".to_string()));

    let no_hsm = ChainedKeyProvider::new(
        &KeyProviderConfig::default(),
        StaticMasterSecret::new(&[1u8; 32], &[1u8; 32]),
    );
    assert!(matches!(no_hsm.list_hsm_keys().await, Err(AuditVaultError::Misconfigured(_))));
}
