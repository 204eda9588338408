//! Media type allow-list for body-bearing requests.

use async_trait::async_trait;
use axum::http::{header, StatusCode};

use crate::gateway::check::{reason, Check, CheckResult};
use crate::gateway::request::GatewayRequest;

pub struct ContentTypeCheck {
    /// Lowercased `type/subtype` values.
    accepted: Vec<String>,
}

impl ContentTypeCheck {
    pub fn new(accepted: &[String]) -> Self {
        Self {
            accepted: accepted.iter().map(|m| m.trim().to_ascii_lowercase()).collect(),
        }
    }
}

/// `type/subtype` without parameters, lowercased.
fn essence(value: &str) -> String {
    value.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

#[async_trait]
impl Check for ContentTypeCheck {
    fn name(&self) -> &'static str {
        "content_type"
    }

    async fn apply(&self, request: &mut GatewayRequest) -> CheckResult {
        if !request.is_body_bearing() {
            return CheckResult::Allow;
        }
        let accepted = request
            .header_str(header::CONTENT_TYPE.as_str())
            .map(essence)
            .is_some_and(|media| self.accepted.contains(&media));
        if accepted {
            CheckResult::Allow
        } else {
            CheckResult::deny(StatusCode::UNSUPPORTED_MEDIA_TYPE, reason::UNSUPPORTED_MEDIA_TYPE)
        }
    }
}
