//! Declared body shape validation.

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::config::{BodySchema, FieldKind, FieldSchema};
use crate::gateway::check::{reason, Check, CheckResult, Deny};
use crate::gateway::forwarder::SanitizedBody;
use crate::gateway::request::GatewayRequest;

/// Placeholder field name reported when the body is not a JSON object.
const BODY: &str = "$body";

pub struct SchemaCheck {
    schema: BodySchema,
}

impl SchemaCheck {
    pub fn new(schema: BodySchema) -> Self {
        Self { schema }
    }

    /// Names of offending fields, in schema order. Empty means valid.
    fn violations(&self, body: &[u8]) -> Vec<String> {
        let doc = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(doc)) => doc,
            _ => return vec![BODY.to_string()],
        };

        self.schema
            .fields
            .iter()
            .filter(|(name, field)| !field_ok(field, doc.get(name.as_str())))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn field_ok(field: &FieldSchema, value: Option<&Value>) -> bool {
    let Some(value) = value else {
        return !field.required;
    };

    let kind_ok = match field.kind {
        FieldKind::Any => true,
        FieldKind::String => value.is_string(),
        FieldKind::Number => value.is_number(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::Object => value.is_object(),
        FieldKind::Array => value.is_array(),
    };
    if !kind_ok {
        return false;
    }

    match (field.max_length, value) {
        (Some(max), Value::String(s)) => s.chars().count() <= max,
        (Some(max), Value::Array(items)) => items.len() <= max,
        _ => true,
    }
}

#[async_trait]
impl Check for SchemaCheck {
    fn name(&self) -> &'static str {
        "schema"
    }

    async fn apply(&self, request: &mut GatewayRequest) -> CheckResult {
        if !request.is_body_bearing() {
            return CheckResult::Allow;
        }

        let body = match request.decoration::<SanitizedBody>() {
            Some(SanitizedBody(bytes)) => bytes,
            None => request.body(),
        };
        let fields = self.violations(body);
        if fields.is_empty() {
            return CheckResult::Allow;
        }

        CheckResult::Deny(
            Deny::new(StatusCode::BAD_REQUEST, reason::VALIDATION_FAILED).with_field("fields", json!(fields)),
        )
    }
}
