//! Per-request state threaded through the pipeline.

use palisade_authz::{Access, Decision};
use palisade_core::{Identity, RequestId};
use std::time::{Duration, Instant};

/// Context that flows through the pipeline.
///
/// Each stage enriches it: the request id stage sets the id, authentication
/// sets the access classification and identity, and authorization records
/// its decision. The context is dropped when the request completes.
///
/// # Example
///
/// ```
/// use palisade_core::{Identity, Role};
/// use palisade_middleware::context::MiddlewareContext;
///
/// let mut ctx = MiddlewareContext::new();
/// assert!(ctx.identity().is_none());
///
/// ctx.set_identity(Identity::new("42", Role::User));
/// assert_eq!(ctx.identity().unwrap().subject_id(), "42");
/// ```
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    request_id: RequestId,
    identity: Option<Identity>,
    access: Option<Access>,
    decision: Option<Decision>,
    started_at: Instant,
}

impl MiddlewareContext {
    /// Creates a context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a specific request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            identity: None,
            access: None,
            decision: None,
            started_at: Instant::now(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the verified caller, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Attaches the verified caller.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    /// Returns the access classification, if authentication has run.
    #[must_use]
    pub fn access(&self) -> Option<Access> {
        self.access
    }

    /// Records the access classification.
    pub fn set_access(&mut self, access: Access) {
        self.access = Some(access);
    }

    /// Returns the authorization decision, if authorization has run.
    #[must_use]
    pub fn decision(&self) -> Option<Decision> {
        self.decision
    }

    /// Records the authorization decision.
    pub fn set_decision(&mut self, decision: Decision) {
        self.decision = Some(decision);
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}
