//! Gateway HTTP server implementation.

use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use http::header::HeaderValue;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use palisade_authz::{PolicyDocument, PolicyEvaluator};
use palisade_core::{Rejection, RequestId, TokenVerifier};
use palisade_middleware::{
    MiddlewareContext, Pipeline, Response, ResponseExt, REQUEST_ID_HEADER,
};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::health::{CheckResult, HealthChecker};
use crate::proxy::Forwarder;
use crate::targets::ProxyTable;

/// Gateway server.
///
/// Everything it holds is built once at startup and shared read-only by
/// every connection.
#[derive(Debug)]
pub struct GatewayServer {
    /// Configuration.
    config: Arc<GatewayConfig>,
    /// Authentication and authorization stages.
    pipeline: Arc<Pipeline>,
    /// Backend client.
    forwarder: Forwarder,
    /// Health checker.
    health: Arc<HealthChecker>,
}

impl GatewayServer {
    /// Create a server, loading the public key and policy named in `config`.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let identity = &config.identity;
        let mut verifier = TokenVerifier::from_pem_file(&identity.public_key_path)?
            .with_leeway(identity.leeway_seconds);
        if let Some(issuer) = &identity.issuer {
            verifier = verifier.with_issuer(issuer.clone());
        }
        debug!(
            issuer = identity.issuer.as_deref(),
            leeway = identity.leeway_seconds,
            "token verifier configured"
        );

        Self::with_verifier(config, verifier)
    }

    /// Create a server with an already loaded verifier.
    pub fn with_verifier(config: GatewayConfig, verifier: TokenVerifier) -> GatewayResult<Self> {
        config.validate()?;

        let policy = load_policy(&config)?;
        let table = ProxyTable::new(&config.routes)?;
        table.log_summary();

        let health = HealthChecker::new()
            .with_check(CheckResult::pass("policy").with_message(format!(
                "{} rules, {} public routes",
                policy.table().len(),
                policy.public_routes().len()
            )))
            .with_check(
                CheckResult::pass("routes").with_message(format!("{} targets", table.len())),
            );

        let forwarder = Forwarder::new(table, &config.gateway)?;
        let pipeline = Pipeline::standard(Arc::new(verifier), Arc::new(policy));
        debug!(stages = ?pipeline.stage_names(), "pipeline built");

        Ok(Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            forwarder,
            health: Arc::new(health),
        })
    }

    /// The configuration the server was built from.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The health checker.
    pub fn health(&self) -> &HealthChecker {
        &self.health
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> GatewayResult<TcpListener> {
        let settings = &self.config.gateway;
        let ip: IpAddr = settings
            .listen_addr
            .parse()
            .map_err(|e| GatewayError::config(format!("invalid listen address: {e}")))?;
        let addr = SocketAddr::new(ip, settings.listen_port);

        TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::server(format!("failed to bind {addr}: {e}")))
    }

    /// Run the gateway until Ctrl-C.
    pub async fn run(self) -> GatewayResult<()> {
        let listener = self.bind().await?;
        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Accept connections on `listener` until `shutdown` completes.
    ///
    /// Connections already accepted run to completion on their own tasks.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, version = crate::VERSION, "Palisade gateway listening");

        let health = Arc::clone(&self.health);
        let state = Arc::new(self);

        health.set_ready(true);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown signal received, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };

                    let state = Arc::clone(&state);

                    // Spawn handler for this connection
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { Ok::<_, Infallible>(state.handle(req, peer_addr).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!(error = %e, peer = %peer_addr, "connection error");
                        }
                    });
                }
            }
        }

        health.set_ready(false);
        Ok(())
    }

    /// Handle an incoming request.
    async fn handle(&self, req: http::Request<Incoming>, peer_addr: SocketAddr) -> Response {
        let ctx = MiddlewareContext::new();
        let request_id = ctx.request_id();

        if let Some(response) = self.health.respond(req.method(), req.uri().path()) {
            return with_request_id(response, request_id);
        }

        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %req.method(),
            path = %req.uri().path(),
            peer = %peer_addr,
        );

        async move {
            // Stages only inspect the head; the body is read once the request is admitted.
            let (parts, body) = req.into_parts();
            let head = http::Request::from_parts(parts, Full::new(Bytes::new()));
            let limit = self.config.gateway.max_request_body_size;
            let forwarder = self.forwarder.clone();

            self.pipeline
                .process(ctx, head, move |ctx, req| {
                    let identity = ctx.identity().cloned();
                    let request_id = ctx.request_id();
                    Box::pin(async move {
                        let (parts, _) = req.into_parts();
                        let body = match read_body(body, limit).await {
                            Ok(body) => body,
                            Err(rejection) => return Response::rejection(rejection),
                        };
                        let request = http::Request::from_parts(parts, Full::new(body));
                        forwarder.forward(identity.as_ref(), request_id, request).await
                    })
                })
                .await
        }
        .instrument(span)
        .await
    }
}

fn load_policy(config: &GatewayConfig) -> GatewayResult<PolicyEvaluator> {
    let document = match &config.policy.path {
        Some(path) => {
            info!(path = %path.display(), "loading policy document");
            PolicyDocument::from_file(path)?
        }
        None => {
            info!("using built-in policy");
            PolicyDocument::builtin()
        }
    };

    Ok(document.compile()?.into_evaluator())
}

/// Collect a request body, refusing anything over `limit` bytes.
async fn read_body(body: Incoming, limit: usize) -> Result<Bytes, Rejection> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(limit, "request body too large");
            Err(Rejection::PayloadTooLarge)
        }
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            Err(Rejection::BadRequest)
        }
    }
}

fn with_request_id(mut response: Response, request_id: RequestId) -> Response {
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(&REQUEST_ID_HEADER, value);
    }
    response
}
