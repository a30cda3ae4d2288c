//! End-to-end pipeline tests.
//!
//! These run the standard four-stage pipeline with the built-in policy and a
//! terminal handler that reports the identity it was given, standing in for
//! the forwarder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use palisade_authz::{AdmitReason, Decision, PolicyDocument};
use palisade_core::{fixtures, Role, TokenVerifier};
use palisade_middleware::{
    full, MiddlewareContext, Pipeline, Request, Response, Stage, REQUEST_ID_HEADER,
};

fn pipeline() -> Pipeline {
    let verifier = TokenVerifier::from_pem(fixtures::TEST_PUBLIC_KEY.as_bytes()).unwrap();
    let policy = PolicyDocument::builtin().compile().unwrap().into_evaluator();
    Pipeline::standard(Arc::new(verifier), Arc::new(policy))
}

fn request(method: Method, path: &str, token: Option<&str>) -> Request {
    let mut builder = http::Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

/// Runs a request; returns the status, body, handler call count and response.
async fn run(pipeline: &Pipeline, request: Request) -> (StatusCode, String, usize, Response) {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler_calls = Arc::clone(&calls);

    let mut response = pipeline
        .process(MiddlewareContext::new(), request, move |ctx, _req| {
            handler_calls.fetch_add(1, Ordering::SeqCst);
            let body = ctx
                .identity()
                .map(|id| format!("{}:{}", id.role(), id.subject_id()))
                .unwrap_or_else(|| "anonymous".to_string());
            Box::pin(async move { http::Response::new(full(body)) })
        })
        .await;

    let status = response.status();
    let body = std::mem::replace(response.body_mut(), full(Bytes::new()))
        .collect()
        .await
        .unwrap()
        .to_bytes();
    (
        status,
        String::from_utf8(body.to_vec()).unwrap(),
        calls.load(Ordering::SeqCst),
        response,
    )
}

#[test]
fn test_standard_stage_order() {
    let names = pipeline().stage_names();
    let expected: Vec<_> = Stage::all().iter().map(|s| s.name()).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn scenario_owner_reads_own_progress() {
    let token = fixtures::token_for("1", Role::User);
    let (status, body, calls, _) =
        run(&pipeline(), request(Method::GET, "/api/users/1/progress", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "user:1");
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn scenario_user_reads_other_progress() {
    let token = fixtures::token_for("1", Role::User);
    let (status, body, calls, _) =
        run(&pipeline(), request(Method::GET, "/api/users/2/progress", Some(&token))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Forbidden: You can only access your own resources."}"#);
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn scenario_public_route_without_token() {
    let (status, body, calls, _) =
        run(&pipeline(), request(Method::GET, "/api/content/courses", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "anonymous");
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn scenario_moderator_reads_any_full_profile() {
    let token = fixtures::token_for("5", Role::Moderator);
    let (status, body, _, _) = run(
        &pipeline(),
        request(Method::GET, "/api/users/99/full-profile", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "moderator:5");
}

#[tokio::test]
async fn scenario_expired_token() {
    let token = fixtures::expired_token_for("1", Role::User);
    let (status, body, calls, _) =
        run(&pipeline(), request(Method::GET, "/api/users/1/progress", Some(&token))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Invalid or expired token"}"#);
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (status, body, calls, _) =
        run(&pipeline(), request(Method::GET, "/api/users/1/progress", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authorization header is required"}"#);
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn test_token_on_public_route_is_ignored() {
    let (status, body, _, _) = run(
        &pipeline(),
        request(Method::GET, "/api/gamification/leaderboard", Some("garbage")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "anonymous");
}

#[tokio::test]
async fn test_admin_reaches_unlisted_route() {
    let token = fixtures::token_for("7", Role::Admin);
    let (status, body, _, _) =
        run(&pipeline(), request(Method::DELETE, "/api/ugc/42", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "admin:7");
}

#[tokio::test]
async fn test_token_signed_by_other_key() {
    let claims = fixtures::access_claims("1", Role::Admin, fixtures::now() + 600);
    let token = fixtures::sign_with(fixtures::OTHER_PRIVATE_KEY, &claims);
    let (status, _, calls, _) =
        run(&pipeline(), request(Method::GET, "/api/users/1/progress", Some(&token))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn test_every_response_carries_request_id() {
    let pipeline = pipeline();
    let token = fixtures::token_for("1", Role::User);

    for req in [
        request(Method::GET, "/api/users/1/progress", Some(&token)),
        request(Method::GET, "/api/users/2/progress", Some(&token)),
        request(Method::GET, "/api/users/1/progress", None),
        request(Method::GET, "/api/content/courses", None),
    ] {
        let (_, _, _, response) = run(&pipeline, req).await;
        let id = response.headers().get(&REQUEST_ID_HEADER).unwrap();
        assert!(uuid_like(id.to_str().unwrap()));
    }
}

fn uuid_like(value: &str) -> bool {
    value.len() == 36 && value.chars().filter(|c| *c == '-').count() == 4
}

#[tokio::test]
async fn test_token_claims_with_numeric_subject() {
    let claims = serde_json::json!({
        "user_id": 314,
        "role": "user",
        "type": "full_auth",
        "exp": fixtures::now() + 600,
    });
    let token = fixtures::sign(&claims);
    let (status, body, _, _) =
        run(&pipeline(), request(Method::GET, "/api/users/314/progress", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "user:314");
}

#[tokio::test]
async fn test_every_public_route_skips_token_verification() {
    let compiled = PolicyDocument::builtin().compile().unwrap();
    let templates: Vec<_> = compiled.public.iter().cloned().collect();
    let pipeline = pipeline();
    assert!(!templates.is_empty());

    for template in templates {
        let path = template
            .pattern()
            .split('/')
            .map(|segment| if segment.starts_with('{') { "1" } else { segment })
            .collect::<Vec<_>>()
            .join("/");

        for token in [None, Some("garbage")] {
            let decision = Arc::new(std::sync::Mutex::new(None));
            let seen = Arc::clone(&decision);

            let response = pipeline
                .process(
                    MiddlewareContext::new(),
                    request(template.method().clone(), &path, token),
                    move |ctx, _req| {
                        assert!(ctx.identity().is_none());
                        *seen.lock().unwrap() = ctx.decision();
                        Box::pin(async move { http::Response::new(full("ok")) })
                    },
                )
                .await;

            assert_eq!(response.status(), StatusCode::OK, "{template} with {token:?}");
            assert_eq!(
                *decision.lock().unwrap(),
                Some(Decision::Admit(AdmitReason::Public)),
                "{template} with {token:?}"
            );
        }
    }
}
