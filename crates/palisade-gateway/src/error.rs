//! Error types for the Palisade gateway.

use std::time::Duration;

use http::StatusCode;
use palisade_authz::PolicyError;
use palisade_core::{KeyError, Rejection};
use palisade_telemetry::TelemetryError;
use thiserror::Error;

/// Gateway errors.
///
/// Startup variants end the process. The upstream variants are produced per
/// request by the forwarder and never reach the client verbatim: they are
/// logged and mapped to a [`Rejection`].
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// A `[[routes]]` entry is invalid or overlaps another.
    #[error("Invalid route '{name}': {message}")]
    Route {
        /// Route name.
        name: String,
        /// Error message.
        message: String,
    },

    /// The token verification key could not be loaded.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The policy document could not be loaded or compiled.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Logging or metrics could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The backend could not be reached or failed mid-request.
    #[error("Upstream error from '{target}': {source}")]
    Upstream {
        /// Route name of the backend.
        target: String,
        /// Client error.
        #[source]
        source: reqwest::Error,
    },

    /// The backend did not respond within the timeout.
    #[error("Upstream '{target}' timed out after {timeout:?}")]
    UpstreamTimeout {
        /// Route name of the backend.
        target: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// Server startup error.
    #[error("Server error: {message}")]
    Server {
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a route error.
    pub fn route(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Route {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    #[allow(clippy::match_same_arms)]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Upstream { source, .. } if source.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Config { .. }
            | Self::Route { .. }
            | Self::Key(_)
            | Self::Policy(_)
            | Self::Telemetry(_)
            | Self::Server { .. }
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The client-facing rejection for a per-request error.
    pub fn rejection(&self) -> Rejection {
        if self.status_code() == StatusCode::GATEWAY_TIMEOUT {
            Rejection::UpstreamTimeout
        } else {
            Rejection::UpstreamUnavailable
        }
    }

    /// Get the error category for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Route { .. } => "route",
            Self::Key(_) => "key",
            Self::Policy(_) => "policy",
            Self::Telemetry(_) => "telemetry",
            Self::Upstream { source, .. } if source.is_timeout() => "timeout",
            Self::Upstream { source, .. } if source.is_connect() => "connect",
            Self::Upstream { .. } => "upstream",
            Self::UpstreamTimeout { .. } => "timeout",
            Self::Server { .. } => "server",
            Self::Io(_) => "io",
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
