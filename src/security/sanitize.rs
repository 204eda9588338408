//! Text sanitization capability.
//!
//! `XssSanitizer` removes `<script>` elements and escapes the remaining
//! angle brackets. The output contains no `<` or `>`, so a second pass finds
//! nothing to remove or escape: sanitizing is idempotent.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::gateway::error::CapabilityError;

#[async_trait]
pub trait Sanitizer: Send + Sync {
    async fn sanitize(&self, input: &str) -> Result<String, CapabilityError>;
}

pub struct XssSanitizer {
    script_block: Regex,
}

impl XssSanitizer {
    pub fn new() -> Result<Self, CapabilityError> {
        let script_block = Regex::new(r"(?is)<script\b[^>]*>.*?(</script\s*>|$)")
            .map_err(|e| CapabilityError::Misconfigured(e.to_string()))?;
        Ok(Self { script_block })
    }

    fn clean(&self, input: &str) -> String {
        let mut text = input.to_string();
        // Removal can splice a new opening tag together; repeat until stable.
        loop {
            let next = self.script_block.replace_all(&text, "").into_owned();
            if next == text {
                break;
            }
            text = next;
        }
        text.replace('<', "&lt;").replace('>', "&gt;")
    }
}

#[async_trait]
impl Sanitizer for XssSanitizer {
    async fn sanitize(&self, input: &str) -> Result<String, CapabilityError> {
        Ok(self.clean(input))
    }
}

/// Rewrite every string value in a JSON document. Object keys are left untouched.
pub async fn sanitize_json(sanitizer: &dyn Sanitizer, value: &mut Value) -> Result<bool, CapabilityError> {
    let mut changed = false;
    let mut stack = vec![value];
    while let Some(node) = stack.pop() {
        match node {
            Value::String(s) => {
                let clean = sanitizer.sanitize(s).await?;
                if clean != *s {
                    *s = clean;
                    changed = true;
                }
            }
            Value::Array(items) => stack.extend(items.iter_mut()),
            Value::Object(map) => stack.extend(map.values_mut()),
            _ => {}
        }
    }
    Ok(changed)
}
