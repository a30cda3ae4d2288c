//! Liveness and readiness endpoints.
//!
//! `GET /health` and `GET /ready` are answered before the pipeline runs, so
//! they need no credentials and never reach a backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use http::{Method, StatusCode};
use palisade_middleware::{Response, ResponseExt};
use serde::{Deserialize, Serialize};

/// Liveness path.
pub const HEALTH_PATH: &str = "/health";

/// Readiness path.
pub const READY_PATH: &str = "/ready";

/// Readiness status of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    /// Gateway is ready to handle traffic.
    Ready,
    /// Gateway is not ready.
    NotReady,
}

impl ReadinessStatus {
    /// Check if the gateway is ready.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Readiness check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status.
    pub status: ReadinessStatus,
    /// Individual check results.
    pub checks: Vec<CheckResult>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Version information.
    pub version: String,
}

/// Result of a single readiness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Optional message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: None,
        }
    }

    /// Create a failing check result.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
        }
    }

    /// Set the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Health checker for the gateway.
///
/// The startup checks are fixed once the server is built; only the listener
/// state changes at runtime.
#[derive(Debug)]
pub struct HealthChecker {
    /// Start time for uptime calculation.
    start_time: Instant,
    /// Whether the listener is accepting connections.
    ready: AtomicBool,
    /// Results of the startup checks.
    startup_checks: Vec<CheckResult>,
}

impl HealthChecker {
    /// Create a new health checker.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ready: AtomicBool::new(false),
            startup_checks: Vec::new(),
        }
    }

    /// Record a startup check.
    #[must_use]
    pub fn with_check(mut self, check: CheckResult) -> Self {
        self.startup_checks.push(check);
        self
    }

    /// Mark the listener as accepting or not.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if the listener is accepting.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Perform a readiness check.
    pub fn readiness(&self) -> ReadinessResponse {
        let listener = if self.is_ready() {
            CheckResult::pass("listener").with_message("accepting connections")
        } else {
            CheckResult::fail("listener", "not accepting connections")
        };

        let mut checks = self.startup_checks.clone();
        checks.push(listener);

        let status = if checks.iter().all(|c| c.passed) {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::NotReady
        };

        ReadinessResponse {
            status,
            checks,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: crate::VERSION.to_string(),
        }
    }

    /// Answer a health or readiness probe, or `None` for any other request.
    pub fn respond(&self, method: &Method, path: &str) -> Option<Response> {
        if method != Method::GET {
            return None;
        }

        match path {
            HEALTH_PATH => Some(Response::text(StatusCode::OK, "OK")),
            READY_PATH => {
                let readiness = self.readiness();
                let status = if readiness.status.is_ready() {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                let body = serde_json::to_string(&readiness).unwrap_or_else(|_| "{}".to_string());
                Some(Response::json(status, body))
            }
            _ => None,
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}
