//! Terminal record of one request.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::gateway::request::RequestMeta;
use crate::observability::events::EventSink;

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// All checks allowed and the origin answered.
    Forwarded,
    /// A gate rejected the request.
    Denied,
    /// A check faulted; the request was failed closed.
    InternalError,
    /// The origin could not be reached or answered badly.
    UpstreamError,
    /// The client went away before a response was produced.
    Cancelled,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Forwarded => "forwarded",
            Decision::Denied => "denied",
            Decision::InternalError => "internal_error",
            Decision::UpstreamError => "upstream_error",
            Decision::Cancelled => "cancelled",
        }
    }
}

/// One record per request, consumed by the event sink.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub request_id: String,
    pub timestamp_ms: u64,
    pub client: IpAddr,
    pub method: String,
    pub path: String,
    pub route: Option<String>,
    pub decision: Decision,
    /// Check (or gateway stage) that stopped the request.
    pub denied_by: Option<&'static str>,
    pub reason: Option<&'static str>,
    /// Status returned to the client.
    pub status: u16,
    pub origin_status: Option<u16>,
    pub forward_latency: Option<Duration>,
    pub total_latency: Duration,
    /// Internal cause, for telemetry only.
    pub cause: Option<String>,
}

impl PipelineOutcome {
    fn base(meta: &RequestMeta, decision: Decision, status: u16) -> Self {
        Self {
            request_id: meta.id.clone(),
            timestamp_ms: meta.timestamp_ms,
            client: meta.client.ip(),
            method: meta.method.to_string(),
            path: meta.path.clone(),
            route: None,
            decision,
            denied_by: None,
            reason: None,
            status,
            origin_status: None,
            forward_latency: None,
            total_latency: meta.received_at.elapsed(),
            cause: None,
        }
    }

    pub fn forwarded(meta: &RequestMeta, status: u16, forward_latency: Duration) -> Self {
        Self {
            origin_status: Some(status),
            forward_latency: Some(forward_latency),
            ..Self::base(meta, Decision::Forwarded, status)
        }
    }

    pub fn denied(meta: &RequestMeta, by: &'static str, reason: &'static str, status: u16) -> Self {
        Self {
            denied_by: Some(by),
            reason: Some(reason),
            ..Self::base(meta, Decision::Denied, status)
        }
    }

    pub fn internal_error(meta: &RequestMeta, by: &'static str, cause: String) -> Self {
        Self {
            denied_by: Some(by),
            reason: Some(crate::gateway::check::reason::INTERNAL_ERROR),
            cause: Some(cause),
            ..Self::base(meta, Decision::InternalError, 500)
        }
    }

    pub fn upstream_error(
        meta: &RequestMeta,
        reason: &'static str,
        status: u16,
        forward_latency: Duration,
        cause: String,
    ) -> Self {
        Self {
            reason: Some(reason),
            forward_latency: Some(forward_latency),
            cause: Some(cause),
            ..Self::base(meta, Decision::UpstreamError, status)
        }
    }

    /// The request deadline elapsed before a response was produced.
    pub fn timed_out(meta: &RequestMeta, by: &'static str, limit: Duration) -> Self {
        Self {
            denied_by: Some(by),
            reason: Some(crate::gateway::check::reason::GATEWAY_TIMEOUT),
            cause: Some(format!("request exceeded {limit:?}")),
            ..Self::base(meta, Decision::InternalError, 504)
        }
    }

    pub fn cancelled(meta: &RequestMeta) -> Self {
        // 499: client closed request
        Self::base(meta, Decision::Cancelled, 499)
    }

    pub fn with_route(mut self, route: &str) -> Self {
        self.route = Some(route.to_string());
        self
    }
}

/// Guarantees the sink sees exactly one record per request.
///
/// If the handler future is dropped before `complete` runs (client
/// disconnect), a `cancelled` record is emitted on drop.
pub struct OutcomeGuard {
    sink: Arc<dyn EventSink>,
    meta: Option<RequestMeta>,
}

impl OutcomeGuard {
    pub fn new(sink: Arc<dyn EventSink>, meta: RequestMeta) -> Self {
        Self {
            sink,
            meta: Some(meta),
        }
    }

    pub fn complete(mut self, outcome: PipelineOutcome) {
        self.meta = None;
        self.sink.record(&outcome);
    }
}

impl Drop for OutcomeGuard {
    fn drop(&mut self) {
        if let Some(meta) = self.meta.take() {
            tracing::debug!(request_id = %meta.id, "Request cancelled before completion");
            self.sink.record(&PipelineOutcome::cancelled(&meta));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::events::MemorySink;
    use axum::http::Method;

    fn meta() -> RequestMeta {
        RequestMeta::new("req-1", "198.51.100.2:4000".parse().unwrap(), Method::GET, "/x")
    }

    #[test]
    fn test_guard_records_once_on_complete() {
        let sink = Arc::new(MemorySink::default());
        let guard = OutcomeGuard::new(sink.clone(), meta());
        guard.complete(PipelineOutcome::denied(&meta(), "authentication", "unauthorized", 401));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Denied);
        assert_eq!(records[0].denied_by, Some("authentication"));
    }

    #[test]
    fn test_guard_records_cancellation_on_drop() {
        let sink = Arc::new(MemorySink::default());
        drop(OutcomeGuard::new(sink.clone(), meta()));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Cancelled);
        assert_eq!(records[0].origin_status, None);
    }

    #[test]
    fn test_outcome_serializes_decision_snake_case() {
        let outcome = PipelineOutcome::upstream_error(
            &meta(),
            "bad_gateway",
            502,
            Duration::from_millis(3),
            "connection refused".into(),
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["decision"], "upstream_error");
        assert_eq!(value["status"], 502);
    }
}
