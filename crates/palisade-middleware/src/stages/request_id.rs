//! Request ID middleware.
//!
//! Every request gets a UUID v7 id, created with its [`MiddlewareContext`]
//! so the server's request span and the pipeline agree on it. It is forwarded
//! to the backend and echoed on the response as `X-Request-Id`, so a client
//! report can be matched to gateway and backend logs.
//!
//! An incoming `X-Request-Id` is never adopted; the gateway assigns every id.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use http::header::{HeaderName, HeaderValue};

/// The header name for request ID propagation.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Middleware that stamps the context's request ID on the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdMiddleware;

impl RequestIdMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let request_id = ctx.request_id();

            let mut response = next.run(ctx, request).await;

            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(&REQUEST_ID_HEADER, value);
            }
            response
        })
    }
}
