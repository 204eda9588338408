//! Presence of a content integrity header on body-bearing requests.
//!
//! Only presence is checked; the value is not compared against the body.

use async_trait::async_trait;
use axum::http::{HeaderName, StatusCode};

use crate::gateway::check::{reason, Check, CheckResult};
use crate::gateway::request::GatewayRequest;

pub struct IntegrityCheck {
    header: HeaderName,
}

impl IntegrityCheck {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

#[async_trait]
impl Check for IntegrityCheck {
    fn name(&self) -> &'static str {
        "integrity"
    }

    async fn apply(&self, request: &mut GatewayRequest) -> CheckResult {
        if !request.is_body_bearing() {
            return CheckResult::Allow;
        }
        let present = request
            .headers()
            .get(&self.header)
            .is_some_and(|v| !v.as_bytes().iter().all(u8::is_ascii_whitespace));
        if present {
            CheckResult::Allow
        } else {
            CheckResult::deny(StatusCode::BAD_REQUEST, reason::INTEGRITY_REQUIRED)
        }
    }
}
