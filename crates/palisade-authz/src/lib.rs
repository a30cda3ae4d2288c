//! Palisade Authorization - role tables with ownership checks
//!
//! This crate decides whether an authenticated caller may perform a request.
//!
//! # Overview
//!
//! - [`PolicyDocument`] is the declarative policy, loaded from TOML or JSON
//!   or taken from [`PolicyDocument::builtin`]
//! - [`PolicyTable`] maps each role to ordered [`PermissionRule`]s
//! - [`PublicRouteSet`] lists the routes that need no identity
//! - [`decide`] turns a request line and caller into a [`Decision`]
//!
//! # Architecture
//!
//! ```text
//!      policy.toml ──► PolicyDocument ──compile──► CompiledPolicy
//!                                                   │        │
//!                                          PublicRouteSet  PolicyTable
//!                                                   │        │
//!     (method, path) ──classify──► Access ──────────┴─► decide ──► Decision
//!                                                   ▲
//!                                          Option<Identity>
//! ```
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use palisade_authz::{AdmitReason, Decision, PolicyDocument};
//! use palisade_core::{Identity, Role};
//!
//! let evaluator = PolicyDocument::builtin().compile().unwrap().into_evaluator();
//! let caller = Identity::new("42", Role::User);
//!
//! let path = "/api/users/42/progress";
//! let access = evaluator.classify(&Method::GET, path);
//! let decision = evaluator.evaluate(&Method::GET, path, Some(&caller), access);
//! assert_eq!(decision, Decision::Admit(AdmitReason::Owner));
//! ```

#![doc(html_root_url = "https://docs.rs/palisade-authz/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod document;
mod error;
mod evaluator;
mod policy;

pub use document::{
    CompiledPolicy, OwnershipKeyword, OwnershipSpec, PolicyDocument, RolePolicy, RouteSpec,
    RuleSpec,
};
pub use error::{PolicyError, PolicyResult};
pub use evaluator::{decide, AdmitReason, Decision, DenyReason, PolicyEvaluator};
pub use policy::{Access, Ownership, PermissionRule, PolicyTable, PublicRouteSet, RuleMatch};
