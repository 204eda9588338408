//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline / checks / forwarder produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!     → events.rs  (one PipelineOutcome per request → EventSink)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems
//! - Metric updates are atomic increments; recording without an installed
//!   exporter is a no-op
//! - Outcome records never carry request bodies or token values

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{EventSink, FanoutSink, MemorySink, MetricsSink, TracingSink};
