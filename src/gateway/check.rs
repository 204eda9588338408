//! The check interface.
//!
//! A check is one named security predicate. It receives the request, may
//! attach decorations, and answers with exactly one `CheckResult`.

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::gateway::error::CheckError;
use crate::gateway::request::GatewayRequest;

/// Stable machine-readable reason codes.
pub mod reason {
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const HTTPS_REQUIRED: &str = "https_required";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const INVALID_TOKEN: &str = "invalid_token";
    pub const TARGET_NOT_ALLOWED: &str = "target_not_allowed";
    pub const INVALID_TARGET: &str = "invalid_target";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UNSUPPORTED_MEDIA_TYPE: &str = "unsupported_media_type";
    pub const INTEGRITY_REQUIRED: &str = "integrity_required";
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    pub const NOT_FOUND: &str = "not_found";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const GATEWAY_TIMEOUT: &str = "gateway_timeout";
}

/// A single security predicate in a pipeline.
///
/// Implementations must only write to the request through
/// [`GatewayRequest::decorate`], must not forward, and must map failures of
/// external capabilities to [`CheckResult::Error`].
#[async_trait]
pub trait Check: Send + Sync {
    /// Name used in logs, telemetry and check ordering.
    fn name(&self) -> &'static str;

    async fn apply(&self, request: &mut GatewayRequest) -> CheckResult;
}

#[derive(Debug)]
pub enum CheckResult {
    Allow,
    Deny(Deny),
    Error(CheckError),
}

impl CheckResult {
    pub fn deny(status: StatusCode, reason: &'static str) -> Self {
        CheckResult::Deny(Deny::new(status, reason))
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, CheckResult::Allow)
    }
}

impl From<CheckError> for CheckResult {
    fn from(err: CheckError) -> Self {
        CheckResult::Error(err)
    }
}

/// A client-facing rejection.
#[derive(Debug, Clone)]
pub struct Deny {
    status: StatusCode,
    reason: &'static str,
    body: Value,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl Deny {
    /// Reject with `{"error": reason}`.
    pub fn new(status: StatusCode, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            body: json!({ "error": reason }),
            headers: Vec::new(),
        }
    }

    /// Add a field to the JSON body. The `error` field is reserved.
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        if key != "error" {
            if let Value::Object(map) = &mut self.body {
                map.insert(key.to_string(), value);
            }
        }
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}

impl IntoResponse for Deny {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        for (name, value) in self.headers {
            response.headers_mut().append(name, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deny_response_shape() {
        let deny = Deny::new(StatusCode::BAD_REQUEST, reason::VALIDATION_FAILED)
            .with_field("fields", json!(["title"]))
            .with_field("error", json!("overwritten?"));
        let response = deny.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "validation_failed", "fields": ["title"] }));
    }

    #[test]
    fn test_deny_headers_attached() {
        let deny = Deny::new(StatusCode::TOO_MANY_REQUESTS, reason::RATE_LIMITED)
            .with_header(HeaderName::from_static("retry-after"), HeaderValue::from_static("1"));
        let response = deny.into_response();
        assert_eq!(response.headers()["retry-after"], "1");
    }
}
