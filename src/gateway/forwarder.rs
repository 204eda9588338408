//! Forwarding admitted requests to the origin.
//!
//! # Responsibilities
//! - Rewrite scheme/authority to the configured origin, keep path + query
//! - Strip hop-by-hop and configured headers in both directions
//! - Append X-Forwarded-* and configured request headers
//! - Send with a bounded timeout and relay the streamed response
//! - Bound the relayed body by the same timeout between frames, so a stalled
//!   origin cannot hold the client connection open
//!
//! # Design Decisions
//! - No retries: a failed forward is reported, never replayed
//! - Every transport failure collapses into `GatewayError`; the client only
//!   ever sees a generic 502/504
//! - Dropping the returned future cancels the upstream call

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderName, HeaderValue, Request, Response, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tower_http::timeout::TimeoutBody;

use crate::config::GatewayConfig;
use crate::gateway::error::GatewayError;
use crate::gateway::request::GatewayRequest;
use crate::security::headers;

/// Body rewritten by the sanitize check; forwarded instead of the original.
#[derive(Debug, Clone)]
pub struct SanitizedBody(pub axum::body::Bytes);

/// How requests are rewritten for the origin. Immutable after startup.
#[derive(Debug, Clone)]
pub struct ForwardSpec {
    pub origin: Authority,
    /// Removed from the forwarded request and the relayed response.
    pub strip_headers: Vec<HeaderName>,
    /// Set on every forwarded request.
    pub add_headers: Vec<(HeaderName, HeaderValue)>,
    pub forwarded_headers: bool,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ForwardSpec {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, axum::http::uri::InvalidUri> {
        let origin = Authority::from_str(&config.origin.authority)?;
        let add_headers = config
            .forward
            .add_request_headers
            .iter()
            .filter_map(|(name, value)| {
                let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
                let value = HeaderValue::from_str(value).ok()?;
                Some((name, value))
            })
            .collect();

        Ok(Self {
            origin,
            strip_headers: headers::parse_names(&config.forward.strip_headers),
            add_headers,
            forwarded_headers: config.forward.forwarded_headers,
            connect_timeout: Duration::from_millis(config.origin.connect_timeout_ms),
            request_timeout: Duration::from_millis(config.origin.request_timeout_ms),
        })
    }
}

/// Sends an admitted request to the origin.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(&self, request: &GatewayRequest) -> Result<Response<Body>, GatewayError>;
}

/// Forwarder backed by a pooled hyper client.
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    spec: ForwardSpec,
}

impl HttpForwarder {
    pub fn new(spec: ForwardSpec) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(spec.connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client, spec }
    }

    fn build_request(&self, request: &GatewayRequest) -> Result<Request<Body>, GatewayError> {
        let mut uri_parts = request.uri().clone().into_parts();
        uri_parts.scheme = Some(Scheme::HTTP);
        uri_parts.authority = Some(self.spec.origin.clone());
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        let uri = Uri::from_parts(uri_parts).map_err(axum::http::Error::from)?;

        let mut headers = request.headers().clone();
        let original_host = headers.remove(header::HOST);
        headers::strip_hop_by_hop(&mut headers);
        headers::strip_named(&mut headers, &self.spec.strip_headers);
        if self.spec.forwarded_headers {
            headers::append_forwarded(&mut headers, request.client_ip(), original_host);
        }
        for (name, value) in &self.spec.add_headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Ok(id) = HeaderValue::from_str(request.id()) {
            headers.insert("x-request-id", id);
        }
        headers.insert(
            header::HOST,
            HeaderValue::from_str(self.spec.origin.as_str()).map_err(axum::http::Error::from)?,
        );

        let body = match request.decoration::<SanitizedBody>() {
            Some(SanitizedBody(bytes)) => bytes.clone(),
            None => request.body().clone(),
        };
        if request.is_body_bearing() || !body.is_empty() {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        let mut builder = Request::builder().method(request.method().clone()).uri(uri);
        if let Some(target) = builder.headers_mut() {
            *target = headers;
        }
        Ok(builder.body(Body::from(body))?)
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn forward(&self, request: &GatewayRequest) -> Result<Response<Body>, GatewayError> {
        let upstream_request = self.build_request(request)?;

        tracing::debug!(
            request_id = %request.id(),
            uri = %upstream_request.uri(),
            "Forwarding request"
        );

        let response = tokio::time::timeout(self.spec.request_timeout, self.client.request(upstream_request))
            .await
            .map_err(|_| GatewayError::Timeout(self.spec.request_timeout))??;

        let (mut parts, body) = response.into_parts();
        headers::strip_hop_by_hop(&mut parts.headers);
        headers::strip_named(&mut parts.headers, &self.spec.strip_headers);
        Ok(Response::from_parts(
            parts,
            Body::new(TimeoutBody::new(self.spec.request_timeout, body)),
        ))
    }
}
