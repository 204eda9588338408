//! Security subsystem: capabilities used by the checks.
//!
//! # Data Flow
//! ```text
//! checks::rate_limit     → rate_limit.rs (per-IP fixed window)
//! checks::auth           → token.rs (token verification)
//! checks::sanitize       → sanitize.rs (XSS sanitizer)
//! forwarder / responses  → headers.rs (hop-by-hop, X-Forwarded-*, hardening)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a capability failure becomes a 500, never an allow
//! - No trust in client input: the rate-limit key is the peer address

pub mod headers;
pub mod rate_limit;
pub mod sanitize;
pub mod token;
