//! Observability for ark container calls
//!
//! Provides:
//! - Prometheus metrics (call latency per operation and route, failures by kind)
//! - Structured logging of call start, completion and failure with tracing

use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::ArkError;
use crate::models::{Operation, RuntimeCoordinate};

/// Histogram buckets for remote call latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ClientMetricsInner> = OnceLock::new();

struct ClientMetricsInner {
    call_duration_seconds: HistogramVec,
    call_failures: IntCounterVec,
}

impl ClientMetricsInner {
    fn new() -> Self {
        Self {
            call_duration_seconds: register_histogram_vec!(
                "arkctl_remote_call_duration_seconds",
                "Time spent on calls to an ark container",
                &["operation", "route"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register call_duration_seconds"),

            call_failures: register_int_counter_vec!(
                "arkctl_remote_call_failures_total",
                "Failed calls to an ark container by error kind",
                &["operation", "kind"]
            )
            .expect("Failed to register call_failures"),
        }
    }
}

/// Handle to the process-wide call metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct ClientMetrics {
    _private: (),
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ClientMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ClientMetricsInner {
        GLOBAL_METRICS.get_or_init(ClientMetricsInner::new)
    }

    pub fn observe_call(&self, operation: Operation, route: &str, duration_secs: f64) {
        self.inner()
            .call_duration_seconds
            .with_label_values(&[operation.path(), route])
            .observe(duration_secs);
    }

    pub fn inc_failure(&self, operation: Operation, kind: &str) {
        self.inner()
            .call_failures
            .with_label_values(&[operation.path(), kind])
            .inc();
    }

    pub fn failure_count(&self, operation: Operation, kind: &str) -> u64 {
        self.inner()
            .call_failures
            .with_label_values(&[operation.path(), kind])
            .get()
    }

    /// Text exposition of every metric in the default registry
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for call events
#[derive(Clone, Default)]
pub struct CallLogger;

impl CallLogger {
    pub fn log_call_started(&self, operation: Operation, coordinate: &RuntimeCoordinate, route: &str) {
        debug!(
            event = "ark_call_started",
            operation = %operation,
            coordinate = %coordinate,
            route = %route,
            "Calling ark container"
        );
    }

    pub fn log_call_succeeded(&self, operation: Operation, coordinate: &RuntimeCoordinate, elapsed_ms: u128) {
        info!(
            event = "ark_call_succeeded",
            operation = %operation,
            coordinate = %coordinate,
            elapsed_ms = elapsed_ms as u64,
            "Ark container call succeeded"
        );
    }

    pub fn log_call_failed(
        &self,
        operation: Operation,
        coordinate: &RuntimeCoordinate,
        elapsed_ms: u128,
        error: &ArkError,
    ) {
        warn!(
            event = "ark_call_failed",
            operation = %operation,
            coordinate = %coordinate,
            elapsed_ms = elapsed_ms as u64,
            kind = error.kind(),
            error = %error,
            "Ark container call failed"
        );
    }

    pub fn log_biz_absent(&self, biz_name: &str, biz_version: &str, coordinate: &RuntimeCoordinate) {
        info!(
            event = "ark_biz_absent",
            biz_name = %biz_name,
            biz_version = %biz_version,
            coordinate = %coordinate,
            "Biz module not installed, nothing to uninstall"
        );
    }
}
