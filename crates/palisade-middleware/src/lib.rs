//! # Palisade Middleware
//!
//! The fixed-order request pipeline of the Palisade gateway.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → RequestId → Telemetry → Authentication → Authorization → Forwarder
//!                                        │                 │
//!                                       401           401 / 403
//! ```
//!
//! | Stage | Middleware     | Purpose                                        |
//! |-------|----------------|------------------------------------------------|
//! | 1     | Request ID     | Generate the UUID v7 id, echo `X-Request-Id`   |
//! | 2     | Telemetry      | Count, time and log every response             |
//! | 3     | Authentication | Public-route check, bearer token verification  |
//! | 4     | Authorization  | Role table and ownership checks                |
//!
//! A stage that rejects returns the response itself; later stages and the
//! forwarder never see the request. The stages share the verifier and the
//! compiled policy through `Arc`, read-only.
//!
//! ## Example
//!
//! ```
//! use palisade_middleware::pipeline::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages[2].name(), "authentication");
//! assert_eq!(stages[3].name(), "authorization");
//! ```

#![doc(html_root_url = "https://docs.rs/palisade-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use context::MiddlewareContext;
pub use middleware::{BoxFuture, Handler, Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder, Stage};
pub use stages::request_id::REQUEST_ID_HEADER;
pub use types::{full, BoxBody, BoxError, Request, Response, ResponseExt};
