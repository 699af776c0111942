//! Latency and usage instrumentation for crypto operations
//!
//! [`CryptoMetrics`] wraps key acquisition and AEAD calls. Every wrapped call
//! updates the in-process counters returned by [`CryptoMetrics::snapshot`]
//! and is mirrored to the `metrics` facade so whichever exporter the host
//! process installs can scrape it.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use auditvault_domain::constants::DEFAULT_SLOW_OPERATION_THRESHOLD_MS;
use auditvault_domain::{KeySource, MetricsConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Counter names exported through the `metrics` facade.
pub mod names {
    pub const OPERATIONS_TOTAL: &str = "auditvault_crypto_operations_total";
    pub const FAILURES_TOTAL: &str = "auditvault_crypto_failures_total";
    pub const HSM_USAGE_TOTAL: &str = "auditvault_hsm_usage_total";
    pub const FALLBACK_USAGE_TOTAL: &str = "auditvault_fallback_usage_total";
    pub const DURATION_MS: &str = "auditvault_crypto_operation_duration_ms";
}

/// Point-in-time copy of the crypto counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_operations: u64,
    pub failed_operations: u64,
    pub total_time_ms: f64,
    pub max_time_ms: f64,
    pub hsm_usage_count: u64,
    pub fallback_usage_count: u64,
    pub slow_operations: u64,
}

impl MetricsSnapshot {
    pub fn average_time_ms(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }
        self.total_time_ms / self.total_operations as f64
    }

    /// Share of successful operations served by a fallback tier (0.0-100.0).
    pub fn fallback_percent(&self) -> f64 {
        let served = self.hsm_usage_count + self.fallback_usage_count;
        if served == 0 {
            return 0.0;
        }
        (self.fallback_usage_count as f64 / served as f64) * 100.0
    }
}

/// Thread-safe recorder shared by the key provider and the field cipher.
#[derive(Debug)]
pub struct CryptoMetrics {
    state: Mutex<MetricsSnapshot>,
    slow_threshold: Duration,
}

impl CryptoMetrics {
    pub fn new(config: &MetricsConfig) -> Self {
        Self::with_threshold(Duration::from_millis(config.slow_operation_threshold_ms))
    }

    pub fn with_threshold(slow_threshold: Duration) -> Self {
        Self { state: Mutex::new(MetricsSnapshot::default()), slow_threshold }
    }

    /// Time `operation` and record its outcome against `source`.
    ///
    /// The future's result is returned untouched; an error still counts its
    /// elapsed time and a failure.
    pub async fn measure<T, E, Fut>(
        &self,
        operation: &'static str,
        source: KeySource,
        operation_future: Fut,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = operation_future.await;
        self.record(operation, source, started.elapsed(), result.is_ok());
        result
    }

    /// Synchronous counterpart of [`CryptoMetrics::measure`].
    pub fn measure_sync<T, E>(
        &self,
        operation: &'static str,
        source: KeySource,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let started = Instant::now();
        let result = f();
        self.record(operation, source, started.elapsed(), result.is_ok());
        result
    }

    /// Record one completed operation.
    pub fn record(&self, operation: &'static str, source: KeySource, elapsed: Duration, ok: bool) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let slow = elapsed > self.slow_threshold;

        {
            let mut state = self.lock_state();
            state.total_operations += 1;
            state.total_time_ms += elapsed_ms;
            if elapsed_ms > state.max_time_ms {
                state.max_time_ms = elapsed_ms;
            }
            if ok {
                if source.is_fallback() {
                    state.fallback_usage_count += 1;
                } else {
                    state.hsm_usage_count += 1;
                }
            } else {
                state.failed_operations += 1;
            }
            if slow {
                state.slow_operations += 1;
            }
        }

        let outcome = if ok { "success" } else { "failure" };
        ::metrics::counter!(names::OPERATIONS_TOTAL, "operation" => operation, "source" => source.as_str(), "outcome" => outcome)
            .increment(1);
        ::metrics::histogram!(names::DURATION_MS, "operation" => operation).record(elapsed_ms);
        if ok {
            let name =
                if source.is_fallback() { names::FALLBACK_USAGE_TOTAL } else { names::HSM_USAGE_TOTAL };
            ::metrics::counter!(name, "source" => source.as_str()).increment(1);
        } else {
            ::metrics::counter!(names::FAILURES_TOTAL, "operation" => operation).increment(1);
        }

        if slow {
            warn!(
                operation,
                source = source.as_str(),
                elapsed_ms,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "crypto.slow_operation"
            );
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.lock_state().clone()
    }

    pub fn reset(&self) {
        *self.lock_state() = MetricsSnapshot::default();
    }

    fn lock_state(&self) -> MutexGuard<'_, MetricsSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CryptoMetrics {
    fn default() -> Self {
        Self::with_threshold(Duration::from_millis(DEFAULT_SLOW_OPERATION_THRESHOLD_MS))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for instrumentation.
    use super::*;

    /// Validates `CryptoMetrics::record` behavior for the usage split
    /// scenario.
    ///
    /// Assertions:
    /// - HSM successes and fallback successes land in separate counters.
    /// - `max_time_ms` tracks the slowest call.
    #[test]
    fn record_splits_hsm_and_fallback_usage() {
        let metrics = CryptoMetrics::default();
        metrics.record("get_key", KeySource::Hsm, Duration::from_millis(5), true);
        metrics.record("get_key", KeySource::Tpm, Duration::from_millis(40), true);
        metrics.record("get_key", KeySource::Software, Duration::from_millis(15), true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_operations, 3);
        assert_eq!(snapshot.hsm_usage_count, 1);
        assert_eq!(snapshot.fallback_usage_count, 2);
        assert!((snapshot.max_time_ms - 40.0).abs() < 1e-6);
        assert!((snapshot.total_time_ms - 60.0).abs() < 1e-6);
        assert!((snapshot.average_time_ms() - 20.0).abs() < 1e-6);
    }

    /// Validates `CryptoMetrics::measure` behavior for the failing future
    /// scenario.
    ///
    /// Assertions:
    /// - The original error value is returned unchanged.
    /// - Elapsed time and a failure are still recorded.
    #[tokio::test]
    async fn measure_passes_errors_through() {
        let metrics = CryptoMetrics::default();
        let result: Result<(), &str> =
            metrics.measure("encrypt_fields", KeySource::Hsm, async { Err("boom") }).await;

        assert_eq!(result, Err("boom"));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_operations, 1);
        assert_eq!(snapshot.failed_operations, 1);
        assert_eq!(snapshot.hsm_usage_count, 0);
    }

    /// Validates the slow operation threshold scenario.
    ///
    /// Assertions:
    /// - Calls above the threshold are counted as slow.
    #[test]
    fn slow_operations_are_counted() {
        let metrics = CryptoMetrics::with_threshold(Duration::from_millis(200));
        metrics.record("get_key", KeySource::Hsm, Duration::from_millis(199), true);
        metrics.record("get_key", KeySource::Hsm, Duration::from_millis(201), true);
        assert_eq!(metrics.snapshot().slow_operations, 1);
    }

    #[test]
    fn measure_records_success_for_source() {
        let metrics = CryptoMetrics::default();
        let value: Result<u8, ()> =
            tokio_test::block_on(metrics.measure("key_provider.tpm", KeySource::Tpm, async { Ok(3) }));

        assert_eq!(value, Ok(3));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fallback_usage_count, 1);
        assert_eq!(snapshot.failed_operations, 0);
    }

    #[test]
    fn measure_sync_returns_value() {
        let metrics = CryptoMetrics::default();
        let value: Result<u8, ()> = metrics.measure_sync("decrypt_fields", KeySource::Software, || Ok(7));
        assert_eq!(value, Ok(7));
        assert_eq!(metrics.snapshot().fallback_percent(), 100.0);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
