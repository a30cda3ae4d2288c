//! Core middleware trait and chain types.
//!
//! A [`Middleware`] receives the mutable context, the request and a [`Next`]
//! continuation. Calling `next.run()` passes control to the rest of the
//! chain; returning a response without calling it short-circuits.
//!
//! # Example
//!
//! ```ignore
//! use palisade_middleware::{BoxFuture, Middleware, MiddlewareContext, Next, Request, Response};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let response = next.run(ctx, request).await;
//!             tracing::debug!(elapsed = ?ctx.elapsed(), "done");
//!             response
//!         })
//!     }
//! }
//! ```

use crate::context::MiddlewareContext;
use crate::types::{Request, Response};
use std::future::Future;
use std::pin::Pin;

/// A boxed future that returns a response.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The terminal handler invoked after every stage has admitted the request.
pub type Handler<'a> =
    Box<dyn FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a>;

/// A pipeline stage.
///
/// # Invariants
///
/// - A stage calls `next.run()` at most once
/// - A stage that rejects returns its own response without calling `next`
pub trait Middleware: Send + Sync + 'static {
    /// Returns the stage name used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// Continuation invoking the rest of the chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(Handler<'a>),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that invokes `middleware`, then `next`.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    pub fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Invokes the next stage or the handler.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Handler(handler) => handler(ctx, request).await,
        }
    }
}
