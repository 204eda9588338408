//! Ordered check evaluation with short-circuit semantics.
//!
//! # Algorithm
//! ```text
//! for check in checks (declared order):
//!     Allow  → next check
//!     Deny   → respond with the deny, stop (no later check, no forward)
//!     Error  → log cause, respond 500 internal_error, stop
//! all allowed → forward → apply response header policy → respond
//! ```
//!
//! Check invocations are bounded by a timeout and isolated from panics; both
//! count as `Error`, so a faulty gate fails closed.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use tokio::time::Instant;

use crate::gateway::check::{reason, Check, CheckResult};
use crate::gateway::error::CheckError;
use crate::gateway::forwarder::Forward;
use crate::gateway::outcome::PipelineOutcome;
use crate::gateway::request::GatewayRequest;
use crate::http::response::json_error;
use crate::observability::metrics;
use crate::security::headers;

/// Identifying response headers to remove, attached by the header hygiene
/// check and applied on the response path.
#[derive(Debug, Clone)]
pub struct ResponseHeaderPolicy {
    pub strip: Vec<axum::http::HeaderName>,
}

/// A fixed sequence of checks in front of a forwarder.
pub struct Pipeline {
    route: String,
    checks: Vec<Arc<dyn Check>>,
    forwarder: Arc<dyn Forward>,
    check_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        route: impl Into<String>,
        checks: Vec<Arc<dyn Check>>,
        forwarder: Arc<dyn Forward>,
        check_timeout: Duration,
    ) -> Self {
        Self {
            route: route.into(),
            checks,
            forwarder,
            check_timeout,
        }
    }

    /// Check names in evaluation order.
    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run every check, then forward if all allowed.
    pub async fn evaluate(&self, mut request: GatewayRequest) -> (Response, PipelineOutcome) {
        for check in &self.checks {
            match self.run_check(check.as_ref(), &mut request).await {
                CheckResult::Allow => continue,
                CheckResult::Deny(deny) => {
                    tracing::info!(
                        request_id = %request.id(),
                        route = %self.route,
                        check = check.name(),
                        reason = deny.reason(),
                        status = deny.status().as_u16(),
                        "Request denied"
                    );
                    let outcome =
                        PipelineOutcome::denied(request.meta(), check.name(), deny.reason(), deny.status().as_u16())
                            .with_route(&self.route);
                    return (deny.into_response(), outcome);
                }
                CheckResult::Error(err) => {
                    tracing::error!(
                        request_id = %request.id(),
                        route = %self.route,
                        check = check.name(),
                        error = %err,
                        "Check failed, rejecting request"
                    );
                    let outcome = PipelineOutcome::internal_error(request.meta(), check.name(), err.to_string())
                        .with_route(&self.route);
                    let response = json_error(StatusCode::INTERNAL_SERVER_ERROR, reason::INTERNAL_ERROR);
                    return (response, outcome);
                }
            }
        }

        self.forward(request).await
    }

    async fn run_check(&self, check: &dyn Check, request: &mut GatewayRequest) -> CheckResult {
        let started = Instant::now();
        let guarded = AssertUnwindSafe(check.apply(request)).catch_unwind();
        let result = match tokio::time::timeout(self.check_timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => CheckResult::Error(CheckError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => CheckResult::Error(CheckError::Timeout(self.check_timeout)),
        };
        metrics::record_check(check.name(), &result, started);
        result
    }

    async fn forward(&self, request: GatewayRequest) -> (Response, PipelineOutcome) {
        let started = Instant::now();
        match self.forwarder.forward(&request).await {
            Ok(mut response) => {
                if let Some(policy) = request.decoration::<ResponseHeaderPolicy>() {
                    headers::strip_named(response.headers_mut(), &policy.strip);
                }
                let status = response.status().as_u16();
                let outcome =
                    PipelineOutcome::forwarded(request.meta(), status, started.elapsed()).with_route(&self.route);
                (response, outcome)
            }
            Err(err) => {
                tracing::warn!(
                    request_id = %request.id(),
                    route = %self.route,
                    error = %err,
                    "Upstream error"
                );
                let status = err.status();
                let outcome = PipelineOutcome::upstream_error(
                    request.meta(),
                    err.reason(),
                    status.as_u16(),
                    started.elapsed(),
                    err.to_string(),
                )
                .with_route(&self.route);
                (json_error(status, err.reason()), outcome)
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
