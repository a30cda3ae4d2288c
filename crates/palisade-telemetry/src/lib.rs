//! Logging and metrics for the Palisade gateway.
//!
//! - **Logging**: structured log lines via `tracing-subscriber`, JSON in
//!   production and human-readable in development
//! - **Metrics**: Prometheus counters and histograms via the `metrics` crate,
//!   scraped from a dedicated listener
//!
//! # Example
//!
//! ```rust,ignore
//! use palisade_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::builder()
//!         .service_name("palisade-gateway")
//!         .metrics_addr("0.0.0.0:9090")
//!         .build();
//!
//!     init_telemetry(&config).expect("telemetry");
//! }
//! ```
//!
//! # Metrics Endpoint
//!
//! ```text
//! # TYPE palisade_requests_total counter
//! palisade_requests_total{service="palisade-gateway",status="200"} 1234
//! palisade_requests_total{service="palisade-gateway",status="403"} 56
//!
//! # TYPE palisade_authz_decisions_total counter
//! palisade_authz_decisions_total{allowed="false",reason="not_owner",service="palisade-gateway"} 7
//! ```

#![doc(html_root_url = "https://docs.rs/palisade-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{
    init_metrics, record_authn_failure, record_authz_decision, record_request,
    record_upstream_error, render_metrics, InFlightGuard, MetricsConfig,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;

    tracing::info!(
        service = %config.service_name,
        metrics = config.metrics.enabled,
        metrics_addr = %config.metrics.addr,
        "telemetry initialized"
    );

    Ok(())
}
