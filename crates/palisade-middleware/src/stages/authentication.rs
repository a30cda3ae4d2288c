//! Authentication middleware.
//!
//! The only stage that reads the raw `Authorization` header.
//!
//! 1. A request matching a public route is classified [`Access::Public`] and
//!    passed on without looking at the header. A token on a public route is
//!    ignored, not validated.
//! 2. Otherwise the request must carry `Authorization: Bearer <token>`. A
//!    missing or malformed header is rejected with 401
//!    `Authorization header is required`.
//! 3. The token is verified. Any failure is rejected with 401
//!    `Invalid or expired token`; the specific cause is only logged.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use http::header::AUTHORIZATION;
use http::HeaderMap;
use palisade_authz::{Access, PolicyEvaluator};
use palisade_core::{Rejection, TokenVerifier};
use palisade_telemetry::record_authn_failure;
use std::sync::Arc;
use tracing::debug;

/// Middleware that verifies bearer tokens on protected routes.
#[derive(Debug, Clone)]
pub struct AuthenticationMiddleware {
    verifier: Arc<TokenVerifier>,
    policy: Arc<PolicyEvaluator>,
}

impl AuthenticationMiddleware {
    /// Creates the stage from the shared verifier and compiled policy.
    #[must_use]
    pub fn new(verifier: Arc<TokenVerifier>, policy: Arc<PolicyEvaluator>) -> Self {
        Self { verifier, policy }
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively. Returns `None` for a missing
/// header, another scheme, an empty token or a token containing whitespace.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

impl Middleware for AuthenticationMiddleware {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let access = self
                .policy
                .classify(request.method(), request.uri().path());
            ctx.set_access(access);

            if access == Access::Public {
                return next.run(ctx, request).await;
            }

            let verified = match bearer_token(request.headers()) {
                Some(token) => self.verifier.verify(token),
                None => {
                    debug!(request_id = %ctx.request_id(), "missing or malformed bearer credentials");
                    record_authn_failure("missing");
                    return Response::rejection(Rejection::MissingCredentials);
                }
            };

            match verified {
                Ok(identity) => {
                    debug!(
                        request_id = %ctx.request_id(),
                        subject = identity.subject_id(),
                        role = %identity.role(),
                        "token verified"
                    );
                    ctx.set_identity(identity);
                    next.run(ctx, request).await
                }
                Err(error) => {
                    debug!(
                        request_id = %ctx.request_id(),
                        reason = error.reason(),
                        %error,
                        "token rejected"
                    );
                    record_authn_failure(error.reason());
                    Response::rejection(Rejection::InvalidCredentials)
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
    use http::{HeaderValue, Method, StatusCode};
    use http_body_util::Full;
    use palisade_authz::PolicyDocument;
    use palisade_core::fixtures;
    use palisade_core::Role;

    fn stage() -> AuthenticationMiddleware {
        let verifier = TokenVerifier::from_pem(fixtures::TEST_PUBLIC_KEY.as_bytes()).unwrap();
        let policy = PolicyDocument::builtin().compile().unwrap().into_evaluator();
        AuthenticationMiddleware::new(Arc::new(verifier), Arc::new(policy))
    }

    fn request(method: Method, path: &str, authorization: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method(method).uri(path);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn ok_handler<'a>() -> Next<'a> {
        Next::handler(|_ctx, _req| Box::pin(async { http::Response::new(full("OK")) }))
    }

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("BEARER   abc  ")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer a b")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_public_route_skips_verification() {
        let mut ctx = MiddlewareContext::new();
        let req = request(
            Method::GET,
            "/api/content/courses",
            Some("Bearer definitely-not-a-jwt"),
        );

        let response = stage().process(&mut ctx, req, ok_handler()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.access(), Some(Access::Public));
        assert!(ctx.identity().is_none());
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected() {
        let mut ctx = MiddlewareContext::new();
        let req = request(Method::GET, "/api/users/profile", None);

        let response = stage().process(&mut ctx, req, ok_handler()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.access(), Some(Access::Protected));
    }

    #[tokio::test]
    async fn test_valid_token_attaches_identity() {
        let mut ctx = MiddlewareContext::new();
        let token = fixtures::token_for("42", Role::Moderator);
        let req = request(
            Method::GET,
            "/api/users/profile",
            Some(&format!("Bearer {token}")),
        );

        let response = stage().process(&mut ctx, req, ok_handler()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let identity = ctx.identity().unwrap();
        assert_eq!(identity.subject_id(), "42");
        assert_eq!(identity.role(), Role::Moderator);
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let mut ctx = MiddlewareContext::new();
        let token = fixtures::expired_token_for("42", Role::User);
        let req = request(
            Method::GET,
            "/api/users/profile",
            Some(&format!("Bearer {token}")),
        );

        let response = stage().process(&mut ctx, req, ok_handler()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(ctx.identity().is_none());
    }
}
