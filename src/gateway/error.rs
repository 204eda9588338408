//! Error taxonomy for the request pipeline.
//!
//! Client errors never appear here: they are `Deny` values with a reason code.
//! Everything in this module is either an internal fault (fail-closed 500) or
//! an upstream failure (502/504). The `Display` text of these types is for
//! telemetry only and is never written to a client response.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// Failure of an external capability (token verification, sanitization).
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("capability misconfigured: {0}")]
    Misconfigured(String),
}

/// Attempt to overwrite a decoration another check already produced.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("decoration '{0}' already set by an earlier check")]
pub struct DecorationError(pub &'static str);

/// A check could not reach a decision.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Decoration(#[from] DecorationError),

    #[error("check timed out after {0:?}")]
    Timeout(Duration),

    #[error("check panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Internal(String),
}

/// Forwarding to the origin failed.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("could not build upstream request: {0}")]
    InvalidRequest(#[from] axum::http::Error),
}

impl GatewayError {
    /// Status surfaced to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream(_) | GatewayError::InvalidRequest(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable reason code surfaced to the client.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::Timeout(_) => crate::gateway::check::reason::GATEWAY_TIMEOUT,
            GatewayError::Upstream(_) | GatewayError::InvalidRequest(_) => "bad_gateway",
        }
    }
}

/// The gateway could not be assembled from a validated config.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid origin authority: {0}")]
    Origin(#[from] axum::http::uri::InvalidUri),

    #[error("invalid allowed host '{host}': {source}")]
    AllowedHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid header name '{0}'")]
    HeaderName(String),

    #[error("route '{0}' declares schema check without a schema")]
    MissingSchema(String),

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}
