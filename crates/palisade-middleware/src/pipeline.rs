//! Fixed-order request pipeline.
//!
//! The gateway pipeline has four stages in a fixed order:
//!
//! 1. **Request ID** - Generate the UUID v7 request id, echo it on the response
//! 2. **Telemetry** - Count, time and log every request
//! 3. **Authentication** - Classify public/protected, verify the bearer token
//! 4. **Authorization** - Apply the role table and ownership checks
//!
//! The forwarder is the terminal handler. Authentication always runs before
//! authorization, and stages after a rejecting stage never see the request.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::{
    AuthenticationMiddleware, AuthorizationMiddleware, RequestIdMiddleware, TelemetryMiddleware,
};
use crate::types::{Request, Response};
use palisade_authz::PolicyEvaluator;
use palisade_core::TokenVerifier;
use std::sync::Arc;

/// A type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An ordered chain of stages ending in a handler.
///
/// # Example
///
/// ```ignore
/// use palisade_middleware::Pipeline;
///
/// let pipeline = Pipeline::standard(verifier, policy);
/// let response = pipeline
///     .process(MiddlewareContext::new(), request, |ctx, req| forward(ctx, req))
///     .await;
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Builds the gateway's four stages in [`Stage`] order.
    #[must_use]
    pub fn standard(verifier: Arc<TokenVerifier>, policy: Arc<PolicyEvaluator>) -> Self {
        Self::builder()
            .add_stage(RequestIdMiddleware::new())
            .add_stage(TelemetryMiddleware::new())
            .add_stage(AuthenticationMiddleware::new(verifier, Arc::clone(&policy)))
            .add_stage(AuthorizationMiddleware::new(policy))
            .build()
    }

    /// Runs the request through every stage, then the handler.
    pub async fn process<H>(&self, mut ctx: MiddlewareContext, request: Request, handler: H) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        next.run(&mut ctx, request).await
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for a [`Pipeline`].
///
/// Stages run in the order they are added.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn add_stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}

/// The gateway's stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Stage 1: request id generation.
    RequestId = 1,
    /// Stage 2: metrics and access log.
    Telemetry = 2,
    /// Stage 3: bearer token verification.
    Authentication = 3,
    /// Stage 4: role and ownership checks.
    Authorization = 4,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RequestId => "request_id",
            Self::Telemetry => "telemetry",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
        }
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 4] {
        [
            Self::RequestId,
            Self::Telemetry,
            Self::Authentication,
            Self::Authorization,
        ]
    }
}
