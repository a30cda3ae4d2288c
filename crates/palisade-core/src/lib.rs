//! # Palisade Core
//!
//! Core types shared by every Palisade crate:
//!
//! - [`Role`] and [`Identity`] - the verified caller
//! - [`TokenVerifier`] - RS256 bearer token verification
//! - [`Rejection`] - the client-facing refusal taxonomy
//! - [`RequestId`] - UUID v7 request identifier

#![doc(html_root_url = "https://docs.rs/palisade-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fixtures;
mod identity;
mod token;

pub use context::RequestId;
pub use error::{ErrorCategory, ErrorResponse, KeyError, Rejection};
pub use identity::{Identity, Role, UnknownRole};
pub use token::{TokenError, TokenVerifier, FULL_AUTH_TOKEN_TYPE};
