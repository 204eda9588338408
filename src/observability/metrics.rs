//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, decision
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_denials_total` (counter): denials by check and reason
//! - `gateway_check_duration_seconds` (histogram): per-check latency
//! - `gateway_upstream_errors_total` (counter): forward failures by reason
//! - `gateway_rate_limiter_keys` (gauge): tracked rate-limit keys
//!
//! # Design Decisions
//! - Labels are bounded: check names and reason codes are static strings,
//!   paths are never used as labels

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::Instant;

use crate::gateway::check::CheckResult;
use crate::gateway::outcome::PipelineOutcome;

/// Install the Prometheus recorder with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Terminal accounting for one request.
pub fn record_request(outcome: &PipelineOutcome) {
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => outcome.method.clone(),
        "status" => outcome.status.to_string(),
        "decision" => outcome.decision.as_str()
    )
    .increment(1);
    ::metrics::histogram!(
        "gateway_request_duration_seconds",
        "decision" => outcome.decision.as_str()
    )
    .record(outcome.total_latency.as_secs_f64());
}

pub fn record_denial(check: &'static str, reason: &'static str) {
    ::metrics::counter!("gateway_denials_total", "check" => check, "reason" => reason).increment(1);
}

pub fn record_check(check: &'static str, result: &CheckResult, started: Instant) {
    let result = match result {
        CheckResult::Allow => "allow",
        CheckResult::Deny(_) => "deny",
        CheckResult::Error(_) => "error",
    };
    ::metrics::histogram!(
        "gateway_check_duration_seconds",
        "check" => check,
        "result" => result
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_upstream_error(reason: &'static str) {
    ::metrics::counter!("gateway_upstream_errors_total", "reason" => reason).increment(1);
}

pub fn record_rate_limiter_keys(keys: usize) {
    ::metrics::gauge!("gateway_rate_limiter_keys").set(keys as f64);
}
