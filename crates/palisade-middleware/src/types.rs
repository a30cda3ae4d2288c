//! Request and response types used throughout the pipeline.
//!
//! Stages see only the request head. The gateway reads the body after the
//! request is admitted and hands the forwarder a fully buffered copy so it
//! can replay it on a retry. Responses carry a boxed body so backend responses can stream back
//! without buffering.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use palisade_core::Rejection;

/// Error type carried by streamed response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The HTTP request type used in the pipeline.
pub type Request = http::Request<Full<Bytes>>;

/// A boxed response body.
pub type BoxBody = UnsyncBoxBody<Bytes, BoxError>;

/// The HTTP response type used in the pipeline.
pub type Response = http::Response<BoxBody>;

/// Wraps a complete buffer as a response body.
pub fn full(bytes: impl Into<Bytes>) -> BoxBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Extension trait for building gateway-generated responses.
pub trait ResponseExt {
    /// Builds the JSON `{"error": "..."}` response for a rejection.
    fn rejection(rejection: Rejection) -> Response;

    /// Builds a `text/plain` response.
    fn text(status: StatusCode, body: &'static str) -> Response;

    /// Builds an `application/json` response from a serialized body.
    fn json(status: StatusCode, body: String) -> Response;
}

impl ResponseExt for Response {
    fn rejection(rejection: Rejection) -> Response {
        Self::json(rejection.status_code(), rejection.body())
    }

    fn text(status: StatusCode, body: &'static str) -> Response {
        with_content_type(status, full(body), "text/plain; charset=utf-8")
    }

    fn json(status: StatusCode, body: String) -> Response {
        with_content_type(status, full(body), "application/json")
    }
}

fn with_content_type(status: StatusCode, body: BoxBody, content_type: &'static str) -> Response {
    let mut response = http::Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
