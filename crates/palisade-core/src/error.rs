//! Client-facing rejection taxonomy.
//!
//! Every request the gateway refuses maps to exactly one [`Rejection`].
//! A rejection knows its status code and the fixed message placed in the
//! JSON body. Messages never carry request-specific detail; diagnostics go
//! to the log instead.
//!
//! | `Rejection` | Status | Body |
//! |---|---|---|
//! | `MissingCredentials` | 401 | `Authorization header is required` |
//! | `InvalidCredentials` | 401 | `Invalid or expired token` |
//! | `Forbidden` | 403 | `Forbidden: You do not have permission to access this resource.` |
//! | `NotOwner` | 403 | `Forbidden: You can only access your own resources.` |
//! | `BadRequest` | 400 | `Bad Request` |
//! | `NoRoute` | 404 | `Not Found` |
//! | `PayloadTooLarge` | 413 | `Payload Too Large` |
//! | `UpstreamUnavailable` | 502 | `Bad Gateway` |
//! | `UpstreamTimeout` | 504 | `Gateway Timeout` |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Categories of rejections for classification and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed client input.
    Validation,
    /// Missing or invalid credentials.
    Authentication,
    /// Authenticated but not permitted.
    Authorization,
    /// No backend serves the path.
    NotFound,
    /// Backend unreachable.
    External,
    /// Backend too slow.
    Timeout,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::External => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Returns the label used in metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::NotFound => "not_found",
            Self::External => "external",
            Self::Timeout => "timeout",
        }
    }
}

/// A refusal to serve a request.
///
/// # Example
///
/// ```
/// use palisade_core::Rejection;
/// use http::StatusCode;
///
/// let rejection = Rejection::NotOwner;
/// assert_eq!(rejection.status_code(), StatusCode::FORBIDDEN);
/// assert_eq!(
///     rejection.body(),
///     r#"{"error":"Forbidden: You can only access your own resources."}"#
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Rejection {
    /// No usable `Authorization: Bearer` header on a protected route.
    #[error("Authorization header is required")]
    MissingCredentials,
    /// A bearer token was presented but failed verification.
    #[error("Invalid or expired token")]
    InvalidCredentials,
    /// No rule for the caller's role admits the request.
    #[error("Forbidden: You do not have permission to access this resource.")]
    Forbidden,
    /// An ownership rule matched but the caller does not own the resource.
    #[error("Forbidden: You can only access your own resources.")]
    NotOwner,
    /// The request body could not be read.
    #[error("Bad Request")]
    BadRequest,
    /// No proxy target serves the path.
    #[error("Not Found")]
    NoRoute,
    /// The request body exceeds the configured limit.
    #[error("Payload Too Large")]
    PayloadTooLarge,
    /// The backend could not be reached.
    #[error("Bad Gateway")]
    UpstreamUnavailable,
    /// The backend did not answer within the timeout.
    #[error("Gateway Timeout")]
    UpstreamTimeout,
}

impl Rejection {
    /// Returns the category of this rejection.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingCredentials | Self::InvalidCredentials => ErrorCategory::Authentication,
            Self::Forbidden | Self::NotOwner => ErrorCategory::Authorization,
            Self::BadRequest | Self::PayloadTooLarge => ErrorCategory::Validation,
            Self::NoRoute => ErrorCategory::NotFound,
            Self::UpstreamUnavailable => ErrorCategory::External,
            Self::UpstreamTimeout => ErrorCategory::Timeout,
        }
    }

    /// Returns the HTTP status code for this rejection.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            other => other.category().default_status_code(),
        }
    }

    /// Returns the JSON envelope for this rejection.
    #[must_use]
    pub fn envelope(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }

    /// Returns the serialized JSON body.
    #[must_use]
    pub fn body(&self) -> String {
        // A single string field always serializes.
        serde_json::to_string(&self.envelope()).unwrap_or_default()
    }
}

/// The JSON body sent with every rejection: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
}

/// Failures loading the token verification key.
///
/// These are startup errors; the process must not serve traffic without a key.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key file could not be read.
    #[error("failed to read public key '{path}': {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The key material is not a valid RSA public key in PEM form.
    #[error("invalid RSA public key: {0}")]
    Parse(#[source] jsonwebtoken::errors::Error),
}
