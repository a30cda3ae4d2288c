//! Telemetry middleware.
//!
//! Wraps everything after the request id stage, so rejected requests are
//! counted and timed the same as forwarded ones.
//!
//! # Metrics Emitted
//!
//! - `palisade_requests_total{status}`
//! - `palisade_request_duration_seconds`
//! - `palisade_in_flight_requests`

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use palisade_telemetry::{record_request, InFlightGuard};
use std::time::Instant;
use tracing::info;

/// Middleware that records metrics and writes the access log line.
#[derive(Debug, Clone, Default)]
pub struct TelemetryMiddleware {
    _private: (),
}

impl TelemetryMiddleware {
    /// Creates the telemetry stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Middleware for TelemetryMiddleware {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let _in_flight = InFlightGuard::new();
            let start = Instant::now();

            let method = request.method().clone();
            let path = request.uri().path().to_string();

            let response = next.run(ctx, request).await;

            let duration = start.elapsed();
            let status = response.status().as_u16();
            record_request(status, duration);

            let identity = ctx.identity();
            info!(
                request_id = %ctx.request_id(),
                %method,
                path = %path,
                status,
                duration_ms = duration.as_secs_f64() * 1000.0,
                subject = identity.map(|id| id.subject_id()),
                role = identity.map(|id| id.role().as_str()),
                access = ctx.access().map(|access| access.as_str()),
                "request completed"
            );

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{full, ResponseExt};
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use palisade_core::Rejection;

    fn request() -> Request {
        http::Request::builder()
            .uri("/api/users/1/progress")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_passes_response_through() {
        let middleware = TelemetryMiddleware::new();
        let mut ctx = MiddlewareContext::new();
        let next = Next::handler(|_ctx, _req| {
            Box::pin(async { http::Response::new(full("OK")) })
        });

        let response = middleware.process(&mut ctx, request(), next).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_records_rejections() {
        let middleware = TelemetryMiddleware::new();
        let mut ctx = MiddlewareContext::new();
        let next = Next::handler(|_ctx, _req| {
            Box::pin(async { Response::rejection(Rejection::NotOwner) })
        });

        let response = middleware.process(&mut ctx, request(), next).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(middleware.name(), "telemetry");
    }
}
