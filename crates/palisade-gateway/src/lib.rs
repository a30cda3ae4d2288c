//! Palisade Gateway - authenticating, authorizing reverse proxy
//!
//! The gateway fronts a set of independently deployed backend services. Every
//! request is authenticated, checked against the role table and, if admitted,
//! forwarded to the backend that owns its path prefix with the verified
//! identity attached.
//!
//! # Architecture
//!
//! ```text
//!   client ──► /health, /ready ──► HealthChecker
//!     │
//!     ▼
//!   ┌──────────────────────── Pipeline ────────────────────────┐
//!   │ Request ID ─► Telemetry ─► Authentication ─► Authorization │
//!   └──────────────────────────────────────────────┬───────────┘
//!                                                  ▼
//!                                 Forwarder ── ProxyTable ──► backend
//!                                 (X-User-Id, X-User-Role)
//! ```
//!
//! The public key, the compiled policy and the proxy table are loaded once
//! at startup; any failure stops the process before it binds.
//!
//! # Example Usage
//!
//! ```bash
//! # Run the gateway with a configuration file
//! $ palisade-gateway --config /etc/palisade/gateway.toml
//!
//! # Point one route at a local backend
//! $ PALISADE_ROUTE_USERS_URL=http://localhost:3000 palisade-gateway
//! ```

#![doc(html_root_url = "https://docs.rs/palisade-gateway/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod headers;
pub mod health;
pub mod proxy;
pub mod server;
pub mod targets;

pub use config::{GatewayConfig, GatewayConfigBuilder, RouteSettings};
pub use error::{GatewayError, GatewayResult};
pub use health::{HealthChecker, ReadinessStatus};
pub use proxy::Forwarder;
pub use server::GatewayServer;
pub use targets::{ProxyTable, ProxyTarget};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
