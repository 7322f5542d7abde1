//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy endpoint and health check
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Assemble upstream client, credentials and server cache from config
//! - Bind server to listener with graceful shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::{open_store, CachePolicy, ResponseCache};
use crate::config::ProxyConfig;
use crate::error::Result;
use crate::http::handler::ProxyHandler;
use crate::lifecycle::shutdown::wait;
use crate::observability::metrics;
use crate::request::RouteKind;
use crate::upstream::{Forwarder, UpstreamClient};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ProxyHandler>,
}

/// HTTP server for the content proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Fails when the auth setup is incomplete.
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let upstream = UpstreamClient::new(
            config.upstream.url.clone(),
            Duration::from_secs(config.upstream.connect_timeout_secs),
        )?;
        let forwarder = Forwarder::new(
            Arc::new(upstream),
            &config.auth.context(),
            config.upstream.resolved_query_path(config.auth.mode),
        )?;

        let mut handler =
            ProxyHandler::new(Arc::new(forwarder)).verbose_errors(config.server.verbose_errors);
        if config.server.cache {
            let cache = ResponseCache::new(
                open_store(&config.server.storage),
                CachePolicy {
                    max_age: Duration::from_secs(config.server.max_age_secs),
                    stale_while_revalidate: config.server.swr,
                },
            );
            tracing::info!(
                backend = cache.backend(),
                max_age_secs = config.server.max_age_secs,
                swr = config.server.swr,
                "Server response cache enabled"
            );
            handler = handler.with_cache(Arc::new(cache));
        }

        Ok(Self::with_handler(config, handler))
    }

    /// Build a server around an existing handler.
    pub fn with_handler(config: ProxyConfig, handler: ProxyHandler) -> Self {
        let state = AppState {
            handler: Arc::new(handler),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let proxy_route = format!("{}/{{key}}", config.server.route_prefix.trim_end_matches('/'));

        let mut router = Router::new()
            .route(&proxy_route, post(proxy_endpoint))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.listener.max_body_size));

        if config.timeouts.request_secs > 0 {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            route_prefix = %self.config.server.route_prefix,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// `POST {prefix}/{key}`: body is the serialized descriptor.
async fn proxy_endpoint(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let kind = RouteKind::from_key(&key);

    tracing::debug!(key = %key, kind = kind.as_str(), "Proxying request");

    let response = match state.handler.handle(&key, &body).await {
        Ok(raw) => raw.into_response(),
        Err(e) => {
            if e.status_code() != 400 {
                tracing::warn!(key = %key, status = e.status_code(), error = %e, "Proxy request failed");
            }
            e.into_response()
        }
    };

    metrics::record_request(kind.as_str(), response.status().as_u16(), start);
    response
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "cache": state.handler.cache().map(|c| c.backend()),
    }))
}
