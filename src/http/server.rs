//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: guarded catch-all proxy route plus admin API
//! - Wire up middleware (request id, tracing, timeout, body limit, guard)
//! - Forward passed requests to the upstream back-office
//! - Own the guard sweeper for the lifetime of the server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, Request, Uri, Version,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::GuardConfig;
use crate::http::middleware::guard_middleware;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::security::{EdgeGuard, GuardError, GuardStore, MemoryStore, Sweeper};

/// State injected into the forwarding handler.
#[derive(Clone)]
pub struct UpstreamState {
    pub client: Client<HttpConnector, Body>,
    pub authority: Authority,
    pub timeout: Duration,
}

/// HTTP server fronting the back-office with the edge guard.
pub struct HttpServer<S = MemoryStore> {
    router: Router,
    config: GuardConfig,
    guard: Arc<EdgeGuard<S>>,
}

impl HttpServer<MemoryStore> {
    /// Create a new HTTP server with an in-memory guard.
    pub fn new(config: GuardConfig) -> Result<Self, GuardError> {
        Self::with_guard(Arc::new(EdgeGuard::new(config)))
    }
}

impl<S: GuardStore> HttpServer<S> {
    /// Create a server around an existing guard.
    pub fn with_guard(guard: Arc<EdgeGuard<S>>) -> Result<Self, GuardError> {
        let config = guard.config().clone();
        let authority: Authority = config
            .upstream
            .address
            .parse()
            .map_err(|e| GuardError::Upstream(format!("invalid upstream address: {e}")))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let upstream = UpstreamState {
            client,
            authority,
            timeout: Duration::from_secs(config.timeouts.upstream_secs),
        };

        let router = Self::build_router(&config, guard.clone(), upstream);
        Ok(Self {
            router,
            config,
            guard,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, guard: Arc<EdgeGuard<S>>, upstream: UpstreamState) -> Router {
        let mut app = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(upstream)
            .layer(middleware::from_fn_with_state(guard.clone(), guard_middleware::<S>));

        // Merged after the guard layer so admin calls are not guarded.
        if config.admin.enabled {
            app = app.merge(setup_admin_router(guard, &config.admin));
        }

        app.layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        let sweeper_shutdown = Shutdown::new();
        let sweeper_task = self.config.sweep.enabled.then(|| {
            let sweeper = Sweeper::from_config(self.guard.clone());
            tokio::spawn(sweeper.run(sweeper_shutdown.subscribe()))
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await;

        sweeper_shutdown.trigger();
        if let Some(task) = sweeper_task {
            let _ = task.await;
        }

        result?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn guard(&self) -> &Arc<EdgeGuard<S>> {
        &self.guard
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

/// Forward a passed request to the upstream and relay its response as-is.
async fn proxy_handler(State(state): State<UpstreamState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(&request);

    let (mut parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.authority.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => return GuardError::Upstream(e.to_string()).into_response(),
    };
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);

    tracing::debug!(request_id = %request_id, method = %method, path = %path, "Forwarding request");

    let upstream_request = Request::from_parts(parts, body);
    match time::timeout(state.timeout, state.client.request(upstream_request)).await {
        Ok(Ok(response)) => {
            metrics::record_upstream(response.status().as_u16(), start);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(request_id = %request_id, path = %path, error = %e, "Upstream error");
            metrics::record_rejection("upstream_failure");
            GuardError::Upstream(e.to_string()).into_response()
        }
        Err(_) => {
            tracing::error!(request_id = %request_id, path = %path, timeout = ?state.timeout, "Upstream timed out");
            metrics::record_rejection("upstream_failure");
            GuardError::Upstream("timed out".to_string()).into_response()
        }
    }
}

/// Drop headers meaningful only for a single transport hop.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}
