//! The gateway's pipeline stages.
//!
//! 1. [`request_id`] - Generate the request id
//! 2. [`telemetry`] - Metrics and access log
//! 3. [`authentication`] - Public-route check and bearer token verification
//! 4. [`authorization`] - Role table and ownership checks

pub mod authentication;
pub mod authorization;
pub mod request_id;
pub mod telemetry;

pub use authentication::AuthenticationMiddleware;
pub use authorization::AuthorizationMiddleware;
pub use request_id::RequestIdMiddleware;
pub use telemetry::TelemetryMiddleware;
