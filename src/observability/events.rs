//! Sinks for terminal request outcomes.
//!
//! The pipeline emits exactly one [`PipelineOutcome`] per request. Sinks must
//! not block: they run on the request task.

use std::sync::{Arc, Mutex};

use crate::gateway::outcome::{Decision, PipelineOutcome};
use crate::observability::metrics;

/// Consumer of outcome records.
pub trait EventSink: Send + Sync {
    fn record(&self, outcome: &PipelineOutcome);
}

/// Writes each outcome as a structured log event.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, outcome: &PipelineOutcome) {
        let route = outcome.route.as_deref().unwrap_or("-");
        let total_ms = outcome.total_latency.as_secs_f64() * 1000.0;
        match outcome.decision {
            Decision::Forwarded => tracing::info!(
                target: "waf_gateway::outcome",
                request_id = %outcome.request_id,
                client = %outcome.client,
                method = %outcome.method,
                path = %outcome.path,
                route,
                decision = outcome.decision.as_str(),
                status = outcome.status,
                forward_ms = outcome.forward_latency.map(|d| d.as_secs_f64() * 1000.0),
                total_ms,
                "Request forwarded"
            ),
            Decision::Denied => tracing::info!(
                target: "waf_gateway::outcome",
                request_id = %outcome.request_id,
                client = %outcome.client,
                method = %outcome.method,
                path = %outcome.path,
                route,
                decision = outcome.decision.as_str(),
                denied_by = outcome.denied_by,
                reason = outcome.reason,
                status = outcome.status,
                total_ms,
                "Request denied"
            ),
            Decision::InternalError | Decision::UpstreamError => tracing::warn!(
                target: "waf_gateway::outcome",
                request_id = %outcome.request_id,
                client = %outcome.client,
                method = %outcome.method,
                path = %outcome.path,
                route,
                decision = outcome.decision.as_str(),
                stage = outcome.denied_by,
                reason = outcome.reason,
                status = outcome.status,
                cause = outcome.cause.as_deref(),
                total_ms,
                "Request failed"
            ),
            Decision::Cancelled => tracing::debug!(
                target: "waf_gateway::outcome",
                request_id = %outcome.request_id,
                client = %outcome.client,
                path = %outcome.path,
                decision = outcome.decision.as_str(),
                total_ms,
                "Request cancelled"
            ),
        }
    }
}

/// Folds outcomes into the metrics registry.
#[derive(Debug, Default)]
pub struct MetricsSink;

impl EventSink for MetricsSink {
    fn record(&self, outcome: &PipelineOutcome) {
        metrics::record_request(outcome);
        match outcome.decision {
            Decision::Denied => {
                if let (Some(check), Some(reason)) = (outcome.denied_by, outcome.reason) {
                    metrics::record_denial(check, reason);
                }
            }
            Decision::UpstreamError => {
                if let Some(reason) = outcome.reason {
                    metrics::record_upstream_error(reason);
                }
            }
            _ => {}
        }
    }
}

/// Delivers every outcome to each inner sink in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn record(&self, outcome: &PipelineOutcome) {
        for sink in &self.sinks {
            sink.record(outcome);
        }
    }
}

/// Keeps outcomes in memory. Used by tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<PipelineOutcome>>,
}

impl MemorySink {
    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<PipelineOutcome> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn record(&self, outcome: &PipelineOutcome) {
        match self.records.lock() {
            Ok(mut records) => records.push(outcome.clone()),
            Err(poisoned) => poisoned.into_inner().push(outcome.clone()),
        }
    }
}
