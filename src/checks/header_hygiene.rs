//! Removal of identifying response headers.

use async_trait::async_trait;
use axum::http::HeaderName;

use crate::gateway::check::{Check, CheckResult};
use crate::gateway::pipeline::ResponseHeaderPolicy;
use crate::gateway::request::GatewayRequest;

/// Attaches the response strip list. Never denies.
pub struct HeaderHygieneCheck {
    policy: ResponseHeaderPolicy,
}

impl HeaderHygieneCheck {
    pub fn new(strip: Vec<HeaderName>) -> Self {
        Self {
            policy: ResponseHeaderPolicy { strip },
        }
    }
}

#[async_trait]
impl Check for HeaderHygieneCheck {
    fn name(&self) -> &'static str {
        "header_hygiene"
    }

    async fn apply(&self, request: &mut GatewayRequest) -> CheckResult {
        match request.decorate(self.policy.clone()) {
            Ok(()) => CheckResult::Allow,
            Err(e) => CheckResult::Error(e.into()),
        }
    }
}
