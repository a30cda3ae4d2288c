//! Segment-wise route templates for Palisade.
//!
//! This crate compiles path templates such as `/api/users/{userId}/progress`
//! into reusable matchers. The same matchers back both the public-route
//! check and the permission engine, so the two can never disagree about
//! what a path means.
//!
//! # Matching Rules
//!
//! - Paths are split on `/`; the template and the path must have the same
//!   number of segments.
//! - A literal segment must equal the path segment exactly (no decoding,
//!   no case folding).
//! - A `{name}` segment matches any single non-empty segment and binds it.
//!   There are no multi-segment wildcards.
//! - The HTTP method must be equal.
//!
//! # Example
//!
//! ```rust
//! use http::Method;
//! use palisade_router::{RouteSet, RouteTemplate};
//!
//! let mut routes = RouteSet::new();
//! routes.push(
//!     RouteTemplate::parse(Method::GET, "/api/content/courses/{courseId}").unwrap(),
//!     "course",
//! );
//!
//! let hit = routes.first_match(&Method::GET, "/api/content/courses/rust-101").unwrap();
//! assert_eq!(*hit.value, "course");
//! assert_eq!(hit.params.get("courseId"), Some("rust-101"));
//! ```

#![doc(html_root_url = "https://docs.rs/palisade-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod params;
mod route_set;
mod template;

pub use params::Params;
pub use route_set::{RouteMatch, RouteSet};
pub use template::{RouteTemplate, Segment};

use thiserror::Error;

/// Errors raised while compiling a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The pattern does not start with `/`.
    #[error("template '{pattern}' must start with '/'")]
    MissingLeadingSlash {
        /// The offending pattern.
        pattern: String,
    },

    /// A brace appears in a segment that is not exactly `{name}`.
    #[error("template '{pattern}': placeholder must occupy a whole segment, found '{segment}'")]
    PartialPlaceholder {
        /// The offending pattern.
        pattern: String,
        /// The malformed segment.
        segment: String,
    },

    /// A `{}` placeholder has no name.
    #[error("template '{pattern}' has an unnamed placeholder")]
    EmptyParamName {
        /// The offending pattern.
        pattern: String,
    },

    /// A placeholder name contains characters other than alphanumerics or `_`.
    #[error("template '{pattern}' has invalid placeholder name '{name}'")]
    InvalidParamName {
        /// The offending pattern.
        pattern: String,
        /// The rejected name.
        name: String,
    },

    /// The same placeholder name is declared twice.
    #[error("template '{pattern}' declares placeholder '{name}' more than once")]
    DuplicateParam {
        /// The offending pattern.
        pattern: String,
        /// The repeated name.
        name: String,
    },
}
