//! Request gateway subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (axum handler)
//!     → body limit (Content-Length pre-check, bounded read) → 413
//!     → route lookup (routing::RouteTable) → 404
//!     → pipeline.rs (checks in declared order) → Deny / 500
//!     → forwarder.rs (origin call) → relayed response / 502 / 504
//!     → whole request bounded by timeouts.request_secs → 504
//!     → request id + security headers on every response
//!     → outcome.rs (exactly one PipelineOutcome to the EventSink)
//! ```
//!
//! # Design Decisions
//! - Pipelines are built once at startup and never change
//! - The forwarder is reachable only through a pipeline
//! - Internal causes stay in telemetry; clients see reason codes

pub mod check;
pub mod error;
pub mod forwarder;
pub mod outcome;
pub mod pipeline;
pub mod request;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, request::Parts, Method, Request, StatusCode};
use axum::response::Response;

use crate::checks::{self, Capabilities};
use crate::config::GatewayConfig;
use crate::http::response::{finalize, json_error};
use crate::observability::events::EventSink;
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, PathPrefixMatcher};
use crate::routing::{Route, RouteTable};
use crate::security::rate_limit::RateLimiter;
use crate::security::sanitize::XssSanitizer;
use crate::security::token::JwtVerifier;

pub use check::{reason, Check, CheckResult, Deny};
pub use error::{BuildError, CapabilityError, CheckError, DecorationError, GatewayError};
pub use forwarder::{Forward, ForwardSpec, HttpForwarder, SanitizedBody};
pub use outcome::{Decision, OutcomeGuard, PipelineOutcome};
pub use pipeline::{Pipeline, ResponseHeaderPolicy};
pub use request::{GatewayRequest, RequestMeta};

/// Stage names reported when a request is stopped before any check runs.
const STAGE_BODY_LIMIT: &str = "body_limit";
const STAGE_ROUTING: &str = "routing";
const STAGE_DEADLINE: &str = "request_deadline";

/// Everything needed to turn a raw request into a response.
pub struct Gateway {
    routes: RouteTable,
    sink: Arc<dyn EventSink>,
    max_body_size: usize,
    security_headers: bool,
    request_timeout: Duration,
    limiters: Vec<Arc<RateLimiter>>,
}

impl Gateway {
    /// Build with the pooled HTTP forwarder for the configured origin.
    pub fn from_config(config: &GatewayConfig, sink: Arc<dyn EventSink>) -> Result<Self, BuildError> {
        let forwarder = Arc::new(HttpForwarder::new(ForwardSpec::from_config(config)?));
        Self::build(config, forwarder, sink)
    }

    /// Build around any forwarder.
    pub fn build(
        config: &GatewayConfig,
        forwarder: Arc<dyn Forward>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, BuildError> {
        let shared_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.capacity,
            Duration::from_millis(config.rate_limit.window_ms),
            Duration::from_secs(config.rate_limit.idle_evict_secs),
        ));
        let caps = Capabilities {
            limiter: shared_limiter.clone(),
            verifier: Arc::new(JwtVerifier::from_config(&config.auth)),
            sanitizer: Arc::new(XssSanitizer::new()?),
            allowed_hosts: Capabilities::parse_allowed_hosts(&config.target.allowed_hosts)?,
        };

        let mut limiters = vec![shared_limiter];
        let check_timeout = Duration::from_millis(config.timeouts.check_ms);
        let mut routes = Vec::new();
        for route in config.effective_routes() {
            let checks = checks::build_route_checks(config, &route, &caps, &mut limiters)?;
            let methods = route
                .methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
                .collect();
            let matcher = AndMatcher::new(vec![
                Box::new(PathPrefixMatcher::new(route.path_prefix.clone())) as Box<dyn Matcher>,
                Box::new(MethodMatcher::new(methods)),
            ]);
            let pipeline = Pipeline::new(route.name.clone(), checks, forwarder.clone(), check_timeout);

            tracing::info!(
                route = %route.name,
                path_prefix = %route.path_prefix,
                checks = ?pipeline.check_names(),
                "Pipeline built"
            );
            routes.push(Route::new(
                route.name,
                route.priority,
                route.path_prefix.len(),
                matcher,
                pipeline,
            ));
        }

        Ok(Self {
            routes: RouteTable::new(routes),
            sink,
            max_body_size: config.security.max_body_size,
            security_headers: config.headers.security_headers,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            limiters,
        })
    }

    /// Limiters to sweep for idle keys.
    pub fn limiters(&self) -> Vec<Arc<RateLimiter>> {
        self.limiters.clone()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Handle one inbound request end to end.
    pub async fn handle(&self, request: Request<Body>, client: SocketAddr) -> Response {
        let (parts, body) = request.into_parts();
        let id = request::request_id(&parts.headers);
        let meta = RequestMeta::new(id.clone(), client, parts.method.clone(), parts.uri.path());
        let guard = OutcomeGuard::new(self.sink.clone(), meta.clone());

        let (mut response, outcome) =
            match tokio::time::timeout(self.request_timeout, self.process(meta.clone(), parts, body)).await {
                Ok(done) => done,
                Err(_) => {
                    tracing::warn!(request_id = %id, limit = ?self.request_timeout, "Request deadline exceeded");
                    let outcome = PipelineOutcome::timed_out(&meta, STAGE_DEADLINE, self.request_timeout);
                    (json_error(StatusCode::GATEWAY_TIMEOUT, reason::GATEWAY_TIMEOUT), outcome)
                }
            };

        finalize(&mut response, &id, self.security_headers);
        guard.complete(outcome);
        response
    }

    async fn process(&self, meta: RequestMeta, parts: Parts, body: Body) -> (Response, PipelineOutcome) {
        let declared_len = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared_len.is_some_and(|len| len > self.max_body_size as u64) {
            return self.too_large(&meta);
        }

        let bytes = match axum::body::to_bytes(body, self.max_body_size).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(request_id = %meta.id, error = %e, "Body read rejected");
                return self.too_large(&meta);
            }
        };

        let request = GatewayRequest::from_parts(meta, parts, bytes);
        let Some(route) = self.routes.match_request(&request) else {
            tracing::warn!(request_id = %request.id(), path = %request.path(), "No route matched");
            let outcome = PipelineOutcome::denied(request.meta(), STAGE_ROUTING, reason::NOT_FOUND, 404);
            return (json_error(StatusCode::NOT_FOUND, reason::NOT_FOUND), outcome);
        };

        route.pipeline.evaluate(request).await
    }

    fn too_large(&self, meta: &RequestMeta) -> (Response, PipelineOutcome) {
        let outcome = PipelineOutcome::denied(meta, STAGE_BODY_LIMIT, reason::PAYLOAD_TOO_LARGE, 413);
        (json_error(StatusCode::PAYLOAD_TOO_LARGE, reason::PAYLOAD_TOO_LARGE), outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CheckKind, RouteConfig};
    use crate::observability::events::MemorySink;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Origin {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Forward for Origin {
        async fn forward(&self, _request: &GatewayRequest) -> Result<Response<Body>, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(axum::http::Response::builder()
                .status(201)
                .header("x-powered-by", "Express")
                .body(Body::from("created"))?)
        }
    }

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.routes = vec![RouteConfig {
            name: "posts".into(),
            path_prefix: "/posts".into(),
            methods: vec!["post".into()],
            checks: vec![CheckKind::RateLimit, CheckKind::HeaderHygiene, CheckKind::ContentType],
            rate_limit: None,
            schema: None,
            priority: 0,
        }];
        config
    }

    fn gateway() -> (Gateway, Arc<Origin>, Arc<MemorySink>) {
        let origin = Arc::new(Origin::default());
        let sink = Arc::new(MemorySink::default());
        let gateway = Gateway::build(&config(), origin.clone(), sink.clone()).unwrap();
        (gateway, origin, sink)
    }

    fn client() -> SocketAddr {
        "198.51.100.20:40000".parse().unwrap()
    }

    fn post(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/posts")
            .header("content-type", "application/json")
            .header("x-request-id", "rid-7")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn test_forwarded_request_is_hardened_and_recorded() {
        let (gateway, origin, sink) = gateway();
        let response = gateway.handle(post("{}"), client()).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get("x-powered-by").is_none());
        assert_eq!(response.headers()["x-request-id"], "rid-7");
        assert_eq!(response.headers()["x-frame-options"], "SAMEORIGIN");
        assert_eq!(origin.calls.load(Ordering::SeqCst), 1);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Forwarded);
        assert_eq!(records[0].route.as_deref(), Some("posts"));
        assert_eq!(records[0].origin_status, Some(201));
    }

    struct Stalled;

    #[async_trait]
    impl Forward for Stalled {
        async fn forward(&self, _request: &GatewayRequest) -> Result<Response<Body>, GatewayError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Response::new(Body::empty()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_deadline_answers_504_and_records_it() {
        let sink = Arc::new(MemorySink::default());
        let mut config = config();
        config.timeouts.request_secs = 2;
        let gateway = Gateway::build(&config, Arc::new(Stalled), sink.clone()).unwrap();

        let response = gateway.handle(post("{}"), client()).await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.headers()["x-request-id"], "rid-7");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"gateway_timeout"}"#);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, 504);
        assert_eq!(records[0].reason, Some("gateway_timeout"));
        assert_eq!(records[0].denied_by, Some("request_deadline"));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected_before_checks() {
        let (gateway, origin, sink) = gateway();
        let body = vec![b'a'; 10 * 1024 + 1];
        let response = gateway.handle(post(body), client()).await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(origin.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.records()[0].denied_by, Some("body_limit"));
    }

    #[tokio::test]
    async fn test_unrouted_request_is_not_found() {
        let (gateway, origin, sink) = gateway();
        let request = Request::builder().uri("/posts").body(Body::empty()).unwrap();
        let response = gateway.handle(request, client()).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(origin.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.records()[0].reason, Some("not_found"));
    }

    #[tokio::test]
    async fn test_denied_request_never_reaches_origin() {
        let (gateway, origin, sink) = gateway();
        let request = Request::builder()
            .method("POST")
            .uri("/posts")
            .header("content-type", "text/html")
            .body(Body::from("<p>"))
            .unwrap();
        let response = gateway.handle(request, client()).await;

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(origin.calls.load(Ordering::SeqCst), 0);
        let records = sink.records();
        assert_eq!(records[0].denied_by, Some("content_type"));
        assert_eq!(records[0].origin_status, None);
    }
}
