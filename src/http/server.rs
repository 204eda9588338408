//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the gateway handler on every path
//! - Wire up middleware (request ID, tracing); the request deadline lives in
//!   `Gateway::handle` so it is answered and recorded like any other outcome
//! - Bind server to listener with peer address info
//! - Run the rate limiter sweeper alongside the server
//! - Drain on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::gateway::{BuildError, Gateway};
use crate::lifecycle::shutdown::{wait as shutdown_requested, Shutdown};
use crate::observability::events::{EventSink, FanoutSink, MetricsSink, TracingSink};
use crate::security::rate_limit::run_sweeper;

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    gateway: Arc<Gateway>,
    config: GatewayConfig,
}

impl HttpServer {
    /// Build the gateway and router from a validated config.
    pub fn new(config: GatewayConfig) -> Result<Self, BuildError> {
        let sink: Arc<dyn EventSink> = Arc::new(FanoutSink::new(vec![
            Arc::new(TracingSink),
            Arc::new(MetricsSink),
        ]));
        Self::with_sink(config, sink)
    }

    /// Build with a caller-provided event sink.
    pub fn with_sink(config: GatewayConfig, sink: Arc<dyn EventSink>) -> Result<Self, BuildError> {
        let gateway = Arc::new(Gateway::from_config(&config, sink)?);
        let router = Self::build_router(gateway.clone());
        Ok(Self {
            router,
            gateway,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(gateway: Arc<Gateway>) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id());

        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(gateway)
            .layer(middleware)
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            origin = %self.config.origin.authority,
            routes = self.gateway.routes().len(),
            "HTTP server starting"
        );

        let sweeper = tokio::spawn(run_sweeper(
            self.gateway.limiters(),
            Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
            shutdown.subscribe(),
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_requested(shutdown.subscribe()))
            .await?;

        // Stopped for a reason other than the signal: release the sweeper too.
        shutdown.trigger();
        let _ = sweeper.await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }
}

/// Every request, whatever its path or method, goes through the gateway.
async fn gateway_handler(
    State(gateway): State<Arc<Gateway>>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    gateway.handle(request, client).await
}
