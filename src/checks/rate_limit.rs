//! Per-client admission.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};

use crate::gateway::check::{reason, Check, CheckResult, Deny};
use crate::gateway::request::GatewayRequest;
use crate::security::rate_limit::RateLimiter;

/// Budget left for the client after this request was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub remaining: u32,
    pub reset_after: Duration,
}

pub struct RateLimitCheck {
    limiter: Arc<RateLimiter>,
}

impl RateLimitCheck {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Check for RateLimitCheck {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn apply(&self, request: &mut GatewayRequest) -> CheckResult {
        let admission = self.limiter.consume(&request.client_ip());
        if !admission.allowed {
            // Whole seconds, rounded up, never zero.
            let retry_after = admission.reset_after.as_secs_f64().ceil().max(1.0) as u64;
            return CheckResult::Deny(
                Deny::new(StatusCode::TOO_MANY_REQUESTS, reason::RATE_LIMITED)
                    .with_header(header::RETRY_AFTER, HeaderValue::from(retry_after)),
            );
        }

        let budget = RateBudget {
            remaining: admission.remaining,
            reset_after: admission.reset_after,
        };
        match request.decorate(budget) {
            Ok(()) => CheckResult::Allow,
            Err(e) => CheckResult::Error(e.into()),
        }
    }
}
