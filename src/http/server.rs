//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Build the upstream HTTP client
//! - Bind server to listener, serve until shutdown
//! - Apply route table reloads

use arc_swap::ArcSwap;
use axum::{body::Body, routing::any, Router};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigError, GatewayConfig, LimitsConfig};
use crate::config::validation::validate_config;
use crate::http::proxy::proxy_handler;
use crate::http::request::request_id_layer;
use crate::routing::RouteTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Current route table; replaced wholesale on reload.
    pub routes: Arc<ArcSwap<RouteTable>>,
    pub client: Client<HttpConnector, Body>,
    pub upstream_timeout: Duration,
    pub limits: LimitsConfig,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    routes: Arc<ArcSwap<RouteTable>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let table = RouteTable::from_config(&config.routes).map_err(ConfigError::Validation)?;
        let routes = Arc::new(ArcSwap::from_pointee(table));

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            routes: routes.clone(),
            client,
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
            limits: config.limits.clone(),
        };

        let router = Self::build_router(state);
        Ok(Self { router, routes })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(request_id_layer())
                    .layer(TraceLayer::new_for_http()),
            )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Route tables received on `config_updates` replace the current one.
    /// Returns once `shutdown` fires and in-flight requests have drained.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            services = ?self.routes.load().services(),
            "HTTP server starting"
        );

        let reloader = tokio::spawn(apply_route_updates(self.routes.clone(), config_updates));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Publish a new route table for every valid config received.
async fn apply_route_updates(
    routes: Arc<ArcSwap<RouteTable>>,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
) {
    while let Some(config) = updates.recv().await {
        match RouteTable::from_config(&config.routes) {
            Ok(table) => {
                tracing::info!(services = ?table.services(), "Route table reloaded");
                routes.store(Arc::new(table));
            }
            Err(errors) => {
                tracing::error!(?errors, "Rejected route update, keeping current table");
            }
        }
    }
}
