//! Authorization middleware.
//!
//! Runs after authentication and applies [`palisade_authz::decide`] to the
//! request line, the access classification and the verified identity.
//! A request whose classification is missing is treated as protected, so a
//! misordered pipeline fails closed.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use palisade_authz::{Access, Decision, PolicyEvaluator};
use palisade_telemetry::record_authz_decision;
use std::sync::Arc;
use tracing::info;

/// Middleware that enforces the role table.
#[derive(Debug, Clone)]
pub struct AuthorizationMiddleware {
    policy: Arc<PolicyEvaluator>,
}

impl AuthorizationMiddleware {
    /// Creates the stage from the compiled policy.
    #[must_use]
    pub fn new(policy: Arc<PolicyEvaluator>) -> Self {
        Self { policy }
    }
}

impl Middleware for AuthorizationMiddleware {
    fn name(&self) -> &'static str {
        "authorization"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let access = ctx.access().unwrap_or(Access::Protected);
            let decision = self.policy.evaluate(
                request.method(),
                request.uri().path(),
                ctx.identity(),
                access,
            );

            record_authz_decision(decision.is_admit(), decision.reason());
            ctx.set_decision(decision);

            match decision {
                Decision::Admit(_) => next.run(ctx, request).await,
                Decision::Deny(reason) => {
                    info!(
                        request_id = %ctx.request_id(),
                        method = %request.method(),
                        path = request.uri().path(),
                        role = ctx.identity().map(|id| id.role().as_str()),
                        reason = reason.as_str(),
                        "request denied"
                    );
                    Response::rejection(reason.rejection())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::full;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::{BodyExt, Full};
    use palisade_authz::{AdmitReason, DenyReason, PolicyDocument};
    use palisade_core::{Identity, Role};

    fn stage() -> AuthorizationMiddleware {
        let policy = PolicyDocument::builtin().compile().unwrap().into_evaluator();
        AuthorizationMiddleware::new(Arc::new(policy))
    }

    fn request(method: Method, path: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn ok_handler<'a>() -> Next<'a> {
        Next::handler(|_ctx, _req| Box::pin(async { http::Response::new(full("OK")) }))
    }

    fn context(access: Access, identity: Option<Identity>) -> MiddlewareContext {
        let mut ctx = MiddlewareContext::new();
        ctx.set_access(access);
        if let Some(identity) = identity {
            ctx.set_identity(identity);
        }
        ctx
    }

    async fn body(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_owner_admitted() {
        let mut ctx = context(Access::Protected, Some(Identity::new("1", Role::User)));
        let response = stage()
            .process(&mut ctx, request(Method::GET, "/api/users/1/progress"), ok_handler())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.decision(), Some(Decision::Admit(AdmitReason::Owner)));
    }

    #[tokio::test]
    async fn test_non_owner_denied() {
        let mut ctx = context(Access::Protected, Some(Identity::new("1", Role::User)));
        let response = stage()
            .process(&mut ctx, request(Method::GET, "/api/users/2/progress"), ok_handler())
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body(response).await,
            r#"{"error":"Forbidden: You can only access your own resources."}"#
        );
        assert_eq!(ctx.decision(), Some(Decision::Deny(DenyReason::NotOwner)));
    }

    #[tokio::test]
    async fn test_unlisted_route_forbidden() {
        let mut ctx = context(Access::Protected, Some(Identity::new("1", Role::Moderator)));
        let response = stage()
            .process(&mut ctx, request(Method::DELETE, "/api/users/1"), ok_handler())
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body(response).await,
            r#"{"error":"Forbidden: You do not have permission to access this resource."}"#
        );
    }

    #[tokio::test]
    async fn test_missing_classification_fails_closed() {
        let mut ctx = MiddlewareContext::new();
        let response = stage()
            .process(&mut ctx, request(Method::GET, "/api/content/courses"), ok_handler())
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body(response).await,
            r#"{"error":"Authorization header is required"}"#
        );
    }

    #[tokio::test]
    async fn test_public_admitted_without_identity() {
        let mut ctx = context(Access::Public, None);
        let response = stage()
            .process(&mut ctx, request(Method::GET, "/api/content/courses"), ok_handler())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.decision(), Some(Decision::Admit(AdmitReason::Public)));
    }
}
