//! Request body sanitization.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use serde_json::Value;

use crate::gateway::check::{Check, CheckResult};
use crate::gateway::error::CheckError;
use crate::gateway::forwarder::SanitizedBody;
use crate::gateway::request::GatewayRequest;
use crate::security::sanitize::{sanitize_json, Sanitizer};

/// Rewrites every string in a JSON body. Never denies.
///
/// Bodies that are not JSON are left as received; the content type check is
/// the gate for media types.
pub struct SanitizeCheck {
    sanitizer: Arc<dyn Sanitizer>,
}

impl SanitizeCheck {
    pub fn new(sanitizer: Arc<dyn Sanitizer>) -> Self {
        Self { sanitizer }
    }
}

#[async_trait]
impl Check for SanitizeCheck {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    async fn apply(&self, request: &mut GatewayRequest) -> CheckResult {
        if request.body().is_empty() {
            return CheckResult::Allow;
        }
        let Ok(mut doc) = serde_json::from_slice::<Value>(request.body()) else {
            return CheckResult::Allow;
        };

        match sanitize_json(self.sanitizer.as_ref(), &mut doc).await {
            Ok(false) => CheckResult::Allow,
            Ok(true) => {
                let bytes = match serde_json::to_vec(&doc) {
                    Ok(bytes) => Bytes::from(bytes),
                    Err(e) => return CheckResult::Error(CheckError::Internal(e.to_string())),
                };
                match request.decorate(SanitizedBody(bytes)) {
                    Ok(()) => CheckResult::Allow,
                    Err(e) => CheckResult::Error(e.into()),
                }
            }
            Err(e) => CheckResult::Error(e.into()),
        }
    }
}
