//! HTTP proxy client for forwarding admitted requests to the backends.

use std::sync::Arc;
use std::time::Duration;

use futures_util::TryStreamExt;
use http::Method;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use palisade_core::{Identity, Rejection, RequestId};
use palisade_middleware::{BoxBody, BoxError, Request, Response, ResponseExt};
use palisade_telemetry::record_upstream_error;
use reqwest::Client;
use tracing::{debug, error, warn};

use crate::config::GatewaySettings;
use crate::error::{GatewayError, GatewayResult};
use crate::headers::{filter_request_headers, filter_response_headers, inject_identity};
use crate::targets::{ProxyTable, ProxyTarget};

/// Forwards admitted requests to the backend that serves their path.
///
/// Cheap to clone; clones share the connection pool and the route table.
#[derive(Debug, Clone)]
pub struct Forwarder {
    /// HTTP client.
    client: Client,
    /// Route table.
    table: Arc<ProxyTable>,
    /// Time allowed for a backend to start responding.
    timeout: Duration,
    /// Retries after a connection failure.
    max_retries: u32,
}

impl Forwarder {
    /// Create a forwarder over a compiled route table.
    pub fn new(table: ProxyTable, settings: &GatewaySettings) -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(settings.upstream_timeout)
            .pool_max_idle_per_host(100)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| GatewayError::server(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            table: Arc::new(table),
            timeout: settings.upstream_timeout,
            max_retries: settings.max_retries,
        })
    }

    /// The route table.
    pub fn table(&self) -> &ProxyTable {
        &self.table
    }

    /// Forward a request and stream the backend response back.
    ///
    /// Every failure becomes a [`Rejection`] response; backend details are
    /// only logged.
    pub async fn forward(
        &self,
        identity: Option<&Identity>,
        request_id: RequestId,
        request: Request,
    ) -> Response {
        let Some((target, remainder)) = self.table.resolve(request.uri().path()) else {
            debug!(path = request.uri().path(), "no proxy route for path");
            return Response::rejection(Rejection::NoRoute);
        };

        let url = target.upstream_url(remainder, request.uri().query());

        let mut headers = filter_request_headers(request.headers());
        if let Err(e) = inject_identity(&mut headers, identity, request_id) {
            warn!(error = %e, "identity cannot be encoded as a header");
            return Response::rejection(Rejection::BadRequest);
        }

        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        let attempts = if is_idempotent(&parts.method) {
            self.max_retries.saturating_add(1)
        } else {
            1
        };

        let mut attempt = 1;
        let result = loop {
            let send = self
                .client
                .request(parts.method.clone(), &url)
                .headers(headers.clone())
                .body(body.clone())
                .send();

            match tokio::time::timeout(self.timeout, send).await {
                Err(_elapsed) => {
                    break Err(GatewayError::UpstreamTimeout {
                        target: target.name().to_string(),
                        timeout: self.timeout,
                    })
                }
                Ok(Err(e)) if e.is_connect() && attempt < attempts => {
                    debug!(
                        route = target.name(),
                        attempt,
                        error = %e,
                        "connection to upstream failed, retrying"
                    );
                    attempt += 1;
                }
                Ok(Err(e)) => {
                    break Err(GatewayError::Upstream {
                        target: target.name().to_string(),
                        source: e,
                    })
                }
                Ok(Ok(response)) => break Ok(response),
            }
        };

        match result {
            Ok(response) => stream_response(response),
            Err(e) => upstream_failure(target, &url, &e),
        }
    }
}

/// Methods that may be sent more than once.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE | Method::PUT | Method::DELETE
    )
}

fn stream_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let headers = filter_response_headers(upstream.headers());

    let stream = upstream
        .bytes_stream()
        .map_ok(Frame::data)
        .map_err(BoxError::from);
    let body: BoxBody = StreamBody::new(stream).boxed_unsync();

    let mut response = http::Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn upstream_failure(target: &ProxyTarget, url: &str, err: &GatewayError) -> Response {
    record_upstream_error(target.name(), err.category());

    if matches!(err, GatewayError::UpstreamTimeout { .. }) {
        warn!(route = target.name(), url, error = %err, "upstream timed out");
    } else {
        error!(route = target.name(), url, error = %err, "upstream request failed");
    }

    Response::rejection(err.rejection())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteSettings;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;

    fn forwarder() -> Forwarder {
        let table = ProxyTable::new(&RouteSettings::defaults()).unwrap();
        Forwarder::new(table, &GatewaySettings::default()).unwrap()
    }

    #[test]
    fn test_is_idempotent() {
        assert!(is_idempotent(&Method::GET));
        assert!(is_idempotent(&Method::PUT));
        assert!(is_idempotent(&Method::DELETE));
        assert!(!is_idempotent(&Method::POST));
        assert!(!is_idempotent(&Method::PATCH));
    }

    #[test]
    fn test_unrouted_path_is_not_found() {
        let request = http::Request::builder()
            .uri("/api/unknown/1")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = tokio_test::block_on(forwarder().forward(None, RequestId::new(), request));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_table_is_shared() {
        let forwarder = forwarder();
        let clone = forwarder.clone();
        assert!(Arc::ptr_eq(&forwarder.table, &clone.table));
        assert_eq!(clone.table().len(), 5);
    }
}
