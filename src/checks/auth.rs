//! Bearer token authentication.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};

use crate::gateway::check::{reason, Check, CheckResult, Deny};
use crate::gateway::request::GatewayRequest;
use crate::security::token::{Claims, TokenVerifier, Verification};

/// Claims of the token that authenticated this request.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims(pub Claims);

impl VerifiedClaims {
    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(|v| v.as_str())
    }
}

pub struct AuthenticationCheck {
    verifier: Arc<dyn TokenVerifier>,
}

impl AuthenticationCheck {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

/// Token from `Authorization: Bearer <token>`. The scheme is case-insensitive.
fn bearer_token(request: &GatewayRequest) -> Option<&str> {
    let value = request.header_str(header::AUTHORIZATION.as_str())?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn unauthorized(reason: &'static str) -> CheckResult {
    CheckResult::Deny(
        Deny::new(StatusCode::UNAUTHORIZED, reason)
            .with_header(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer")),
    )
}

#[async_trait]
impl Check for AuthenticationCheck {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn apply(&self, request: &mut GatewayRequest) -> CheckResult {
        let Some(token) = bearer_token(request) else {
            return unauthorized(reason::UNAUTHORIZED);
        };

        let claims = match self.verifier.verify(token).await {
            Ok(Verification::Valid(claims)) => claims,
            Ok(Verification::Invalid) => return unauthorized(reason::INVALID_TOKEN),
            Err(e) => return CheckResult::Error(e.into()),
        };

        match request.decorate(VerifiedClaims(claims)) {
            Ok(()) => CheckResult::Allow,
            Err(e) => CheckResult::Error(e.into()),
        }
    }
}
