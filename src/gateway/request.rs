//! The request as seen by checks and the forwarder.
//!
//! A `GatewayRequest` is built once from the buffered inbound request. Its
//! fields are read-only; the only mutation available to a check is
//! [`GatewayRequest::decorate`], which writes to a write-once decoration bag.

use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::http::{request::Parts, Extensions, HeaderMap, Method, Request, Uri};
use tokio::time::Instant;

use crate::gateway::error::DecorationError;

/// Identity and timing of a request, shared by the request and its outcome.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub id: String,
    pub client: SocketAddr,
    pub method: Method,
    pub path: String,
    pub received_at: Instant,
    /// Wall clock at receipt, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl RequestMeta {
    pub fn new(id: impl Into<String>, client: SocketAddr, method: Method, path: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            id: id.into(),
            client,
            method,
            path: path.into(),
            received_at: Instant::now(),
            timestamp_ms,
        }
    }
}

/// Per-request scratch storage, keyed by type. Each key can be written once.
#[derive(Debug, Default)]
pub struct Decorations {
    inner: Extensions,
}

impl Decorations {
    /// Insert a value. Fails if a value of the same type is already present.
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Result<(), DecorationError> {
        if self.inner.get::<T>().is_some() {
            return Err(DecorationError(short_type_name::<T>()));
        }
        self.inner.insert(value);
        Ok(())
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.inner.get::<T>()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// The inbound `x-request-id`, or a fresh UUID v4.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// A buffered inbound request.
#[derive(Debug)]
pub struct GatewayRequest {
    meta: RequestMeta,
    uri: Uri,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Bytes,
    decorations: Decorations,
}

impl GatewayRequest {
    /// Build from an already-buffered request.
    pub fn new(request: Request<Bytes>, client: SocketAddr) -> Self {
        let (parts, body) = request.into_parts();
        let id = request_id(&parts.headers);
        let meta = RequestMeta::new(id, client, parts.method.clone(), parts.uri.path());
        Self::from_parts(meta, parts, body)
    }

    /// Build from request parts with identity already assigned.
    pub fn from_parts(meta: RequestMeta, parts: Parts, body: Bytes) -> Self {
        let query = parts
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self {
            meta,
            uri: parts.uri,
            headers: parts.headers,
            query,
            body,
            decorations: Decorations::default(),
        }
    }

    pub fn meta(&self) -> &RequestMeta {
        &self.meta
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn method(&self) -> &Method {
        &self.meta.method
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First header value as text, if present and valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Rate-limit key: the source address.
    pub fn client_ip(&self) -> IpAddr {
        self.meta.client.ip()
    }

    /// Whether this method is expected to carry a body.
    pub fn is_body_bearing(&self) -> bool {
        matches!(*self.method(), Method::POST | Method::PUT | Method::PATCH)
    }

    /// Attach derived data for later checks or the forwarder.
    pub fn decorate<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Result<(), DecorationError> {
        self.decorations.insert(value)
    }

    pub fn decoration<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.decorations.get::<T>()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn client() -> SocketAddr {
        "203.0.113.7:51000".parse().unwrap()
    }

    pub fn request(method: &str, uri: &str) -> GatewayRequest {
        request_with(method, uri, &[], "")
    }

    pub fn request_with(method: &str, uri: &str, headers: &[(&str, &str)], body: &str) -> GatewayRequest {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        GatewayRequest::new(builder.body(Bytes::from(body.to_string())).unwrap(), client())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Marker(u32);

    #[test]
    fn test_decorations_are_write_once() {
        let mut req = request("GET", "/");
        req.decorate(Marker(1)).unwrap();
        let err = req.decorate(Marker(2)).unwrap_err();
        assert_eq!(err, DecorationError("Marker"));
        assert_eq!(req.decoration::<Marker>(), Some(&Marker(1)));
    }

    #[test]
    fn test_query_parsing_decodes_values() {
        let req = request("GET", "/fetch?url=http%3A%2F%2Flocalhost%2Fa&x=1&x=2");
        assert_eq!(req.query()[0], ("url".to_string(), "http://localhost/a".to_string()));
        let xs: Vec<_> = req.query().iter().filter(|(k, _)| k == "x").map(|(_, v)| v.as_str()).collect();
        assert_eq!(xs, ["1", "2"]);
    }

    #[test]
    fn test_duplicate_headers_preserved() {
        let req = request_with("GET", "/", &[("Accept", "a/b"), ("accept", "c/d")], "");
        let values: Vec<_> = req.headers().get_all("ACCEPT").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_request_id_from_header_or_generated() {
        let req = request_with("GET", "/", &[("x-request-id", "abc-123")], "");
        assert_eq!(req.id(), "abc-123");
        let generated = request("GET", "/");
        assert_eq!(generated.id().len(), 36);
    }

    #[test]
    fn test_body_bearing_methods() {
        assert!(request("POST", "/").is_body_bearing());
        assert!(request("PATCH", "/").is_body_bearing());
        assert!(!request("GET", "/").is_body_bearing());
        assert!(!request("DELETE", "/").is_body_bearing());
    }
}
