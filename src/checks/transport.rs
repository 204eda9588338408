//! HTTPS enforcement for requests arriving through a TLS terminator.
//!
//! The gateway speaks plain HTTP; the terminator in front of it reports the
//! original scheme in `X-Forwarded-Proto`. The redirect names the configured
//! public host when one is set, and otherwise echoes the inbound `Host`.

use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};

use crate::gateway::check::{reason, Check, CheckResult, Deny};
use crate::gateway::request::GatewayRequest;
use crate::security::headers::X_FORWARDED_PROTO;

pub struct TransportSecurityCheck {
    enforce: bool,
    public_host: Option<String>,
}

impl TransportSecurityCheck {
    pub fn new(enforce: bool, public_host: Option<String>) -> Self {
        Self { enforce, public_host }
    }
}

fn arrived_over_https(request: &GatewayRequest) -> bool {
    request
        .header_str(X_FORWARDED_PROTO.as_str())
        .and_then(|v| v.split(',').next())
        .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

#[async_trait]
impl Check for TransportSecurityCheck {
    fn name(&self) -> &'static str {
        "transport_security"
    }

    async fn apply(&self, request: &mut GatewayRequest) -> CheckResult {
        if !self.enforce || arrived_over_https(request) {
            return CheckResult::Allow;
        }

        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let location = self
            .public_host
            .as_deref()
            .or_else(|| request.header_str(header::HOST.as_str()))
            .and_then(|host| HeaderValue::from_str(&format!("https://{host}{target}")).ok());

        match location {
            Some(location) => CheckResult::Deny(
                Deny::new(StatusCode::PERMANENT_REDIRECT, reason::HTTPS_REQUIRED)
                    .with_header(header::LOCATION, location),
            ),
            // No usable host to redirect to.
            None => CheckResult::deny(StatusCode::BAD_REQUEST, reason::HTTPS_REQUIRED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::request::test_support::*;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_disabled_allows_plain_http() {
        let check = TransportSecurityCheck::new(false, None);
        assert!(check.apply(&mut request("GET", "/")).await.is_allow());
    }

    #[tokio::test]
    async fn test_forwarded_https_allowed() {
        let check = TransportSecurityCheck::new(true, None);
        let mut req = request_with("GET", "/", &[("x-forwarded-proto", "HTTPS, http")], "");
        assert!(check.apply(&mut req).await.is_allow());
    }

    #[tokio::test]
    async fn test_plain_http_redirected_with_location() {
        let check = TransportSecurityCheck::new(true, None);
        let mut req = request_with("GET", "/a/b?x=1", &[("host", "shop.example")], "");
        match check.apply(&mut req).await {
            CheckResult::Deny(deny) => {
                assert_eq!(deny.status(), StatusCode::PERMANENT_REDIRECT);
                let response = deny.into_response();
                assert_eq!(response.headers()[header::LOCATION], "https://shop.example/a/b?x=1");
            }
            other => panic!("expected deny, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_public_host_overrides_inbound_host() {
        let check = TransportSecurityCheck::new(true, Some("shop.example".into()));
        let mut req = request_with("GET", "/login", &[("host", "evil.example")], "");
        match check.apply(&mut req).await {
            CheckResult::Deny(deny) => {
                let response = deny.into_response();
                assert_eq!(response.headers()[header::LOCATION], "https://shop.example/login");
            }
            other => panic!("expected deny, got {:?}", other),
        }

        // No Host header needed once the public host is known.
        match check.apply(&mut request("GET", "/")).await {
            CheckResult::Deny(deny) => assert_eq!(deny.status(), StatusCode::PERMANENT_REDIRECT),
            other => panic!("expected deny, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_host_is_bad_request() {
        let check = TransportSecurityCheck::new(true, None);
        match check.apply(&mut request("GET", "/")).await {
            CheckResult::Deny(deny) => assert_eq!(deny.status(), StatusCode::BAD_REQUEST),
            other => panic!("expected deny, got {:?}", other),
        }
    }
}
