//! Outbound target validation (SSRF guard).
//!
//! A request may name a URL the origin will fetch, as the configured field in
//! the query string (including repeats and `field[]` / `field[N]` forms) or in
//! its JSON body. Every candidate is judged and one failure denies. URLs are
//! parsed with the WHATWG rules used by browsers, and the host compared to the
//! allow-list as a parsed `url::Host`. Numeric and hex IPv4 forms collapse to
//! the dotted address they denote before comparison, and userinfo never counts
//! as host.

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;
use url::{Host, Url};

use crate::gateway::check::{reason, Check, CheckResult};
use crate::gateway::forwarder::SanitizedBody;
use crate::gateway::request::GatewayRequest;

pub struct TargetCheck {
    allowed: Vec<Host<String>>,
    field: String,
}

enum Target<'a> {
    Url(&'a str),
    Malformed,
}

impl TargetCheck {
    pub fn new(allowed: Vec<Host<String>>, field: impl Into<String>) -> Self {
        Self {
            allowed,
            field: field.into(),
        }
    }

    /// `field`, `field[]`, `field[0]` and other bracketed forms.
    fn names_target(&self, key: &str) -> bool {
        match key.strip_prefix(self.field.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('[') && rest.ends_with(']'),
            None => false,
        }
    }

    fn body_target<'a>(&self, doc: &'a Option<Value>) -> Option<Target<'a>> {
        let Some(Value::Object(doc)) = doc else {
            return None;
        };
        match doc.get(&self.field) {
            None | Some(Value::Null) => None,
            Some(Value::String(url)) => Some(Target::Url(url.as_str())),
            Some(_) => Some(Target::Malformed),
        }
    }

    fn judge(&self, target: Target<'_>) -> CheckResult {
        let Target::Url(raw) = target else {
            return CheckResult::deny(StatusCode::BAD_REQUEST, reason::INVALID_TARGET);
        };
        let Ok(url) = Url::parse(raw) else {
            return CheckResult::deny(StatusCode::BAD_REQUEST, reason::INVALID_TARGET);
        };
        if !matches!(url.scheme(), "http" | "https") {
            return CheckResult::deny(StatusCode::BAD_REQUEST, reason::INVALID_TARGET);
        }
        let Some(host) = url.host().map(|h| h.to_owned()) else {
            return CheckResult::deny(StatusCode::BAD_REQUEST, reason::INVALID_TARGET);
        };

        if self.allowed.contains(&host) {
            CheckResult::Allow
        } else {
            tracing::debug!(host = %host, "Target host not in allow-list");
            CheckResult::deny(StatusCode::FORBIDDEN, reason::TARGET_NOT_ALLOWED)
        }
    }
}

#[async_trait]
impl Check for TargetCheck {
    fn name(&self) -> &'static str {
        "target"
    }

    async fn apply(&self, request: &mut GatewayRequest) -> CheckResult {
        let body = match request.decoration::<SanitizedBody>() {
            Some(SanitizedBody(bytes)) => bytes,
            None => request.body(),
        };
        // Non-JSON bodies carry no target field.
        let doc = serde_json::from_slice::<Value>(body).ok();

        let from_query = request
            .query()
            .iter()
            .filter(|(key, _)| self.names_target(key))
            .map(|(_, value)| Target::Url(value.as_str()));
        for target in from_query.chain(self.body_target(&doc)) {
            let verdict = self.judge(target);
            if !verdict.is_allow() {
                return verdict;
            }
        }
        CheckResult::Allow
    }
}
