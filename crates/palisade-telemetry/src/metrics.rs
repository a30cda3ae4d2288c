//! Prometheus metrics for the gateway.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `palisade_requests_total` | Counter | `status` | Requests answered |
//! | `palisade_request_duration_seconds` | Histogram | - | End-to-end latency |
//! | `palisade_in_flight_requests` | Gauge | - | Requests being processed |
//! | `palisade_authn_failures_total` | Counter | `reason` | Rejected bearer tokens |
//! | `palisade_authz_decisions_total` | Counter | `allowed`, `reason` | Authorization outcomes |
//! | `palisade_upstream_errors_total` | Counter | `target`, `kind` | Failed forwards |
//!
//! The recording functions are no-ops until [`init_metrics`] installs a
//! recorder, so library code and tests can call them freely.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Requests answered, by status code.
pub const REQUESTS_TOTAL: &str = "palisade_requests_total";
/// End-to-end request latency.
pub const REQUEST_DURATION_SECONDS: &str = "palisade_request_duration_seconds";
/// Requests currently being processed.
pub const IN_FLIGHT_REQUESTS: &str = "palisade_in_flight_requests";
/// Bearer tokens that failed verification.
pub const AUTHN_FAILURES_TOTAL: &str = "palisade_authn_failures_total";
/// Authorization outcomes.
pub const AUTHZ_DECISIONS_TOTAL: &str = "palisade_authz_decisions_total";
/// Forwards that failed before a backend response arrived.
pub const UPSTREAM_ERRORS_TOTAL: &str = "palisade_upstream_errors_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address of the Prometheus scrape listener (e.g., "0.0.0.0:9090").
    pub addr: String,

    /// Service name, reported as a global label.
    pub service_name: String,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:9090".to_string(),
            service_name: "palisade".to_string(),
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for a bad listener address and
/// `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let mut builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone());

    if !config.duration_buckets.is_empty() {
        builder = builder
            .set_buckets_for_metric(
                Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
                &config.duration_buckets,
            )
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    let handle = builder
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of requests answered by the gateway");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "Request duration from receipt to response head, in seconds"
    );
    describe_gauge!(IN_FLIGHT_REQUESTS, "Number of requests currently being processed");
    describe_counter!(AUTHN_FAILURES_TOTAL, "Bearer tokens rejected, by reason");
    describe_counter!(AUTHZ_DECISIONS_TOTAL, "Authorization decisions by outcome and reason");
    describe_counter!(UPSTREAM_ERRORS_TOTAL, "Failed forwards by target and failure kind");
}

/// Records a completed request.
pub fn record_request(status_code: u16, duration: Duration) {
    counter!(REQUESTS_TOTAL, "status" => status_code.to_string()).increment(1);
    histogram!(REQUEST_DURATION_SECONDS).record(duration.as_secs_f64());
}

/// Records a rejected bearer token.
///
/// `reason` is a short label such as `expired` or `bad_signature`.
pub fn record_authn_failure(reason: &'static str) {
    counter!(AUTHN_FAILURES_TOTAL, "reason" => reason).increment(1);
}

/// Records an authorization decision.
pub fn record_authz_decision(allowed: bool, reason: &'static str) {
    counter!(
        AUTHZ_DECISIONS_TOTAL,
        "allowed" => allowed.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Records a failed forward.
///
/// `kind` is `connect`, `timeout` or `other`.
pub fn record_upstream_error(target: &str, kind: &'static str) {
    counter!(
        UPSTREAM_ERRORS_TOTAL,
        "target" => target.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Increments the in-flight gauge and decrements it on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a guard, incrementing the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_REQUESTS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.addr, "0.0.0.0:9090");
        assert!(config.duration_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_record_functions_without_recorder() {
        record_request(200, Duration::from_millis(10));
        record_authn_failure("expired");
        record_authz_decision(false, "not_owner");
        record_upstream_error("users", "connect");
        let guard = InFlightGuard::new();
        drop(guard);
    }

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            addr: "not-an-address".to_string(),
            ..MetricsConfig::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_disabled_metrics() {
        let config = MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        };
        assert!(init_metrics(&config).is_ok());
        assert!(render_metrics().is_none());
    }
}
