//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The protected origin service.
    pub origin: OriginConfig,

    /// Header rewriting applied while forwarding.
    pub forward: ForwardConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Global rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Token verification settings.
    pub auth: AuthConfig,

    /// SSRF target allow-list.
    pub target: TargetConfig,

    /// Accepted request media types.
    pub content_type: ContentTypeConfig,

    /// Integrity header settings.
    pub integrity: IntegrityConfig,

    /// Response header hygiene.
    pub headers: HeadersConfig,

    /// Request limits and transport enforcement.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Route definitions, each with its own ordered check list.
    pub routes: Vec<RouteConfig>,

    /// Checks of the implicit catch-all route used when `routes` is empty.
    pub default_checks: DefaultChecks,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

/// Origin (protected backend) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Origin authority (e.g., "127.0.0.1:3000").
    pub authority: String,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Upper bound for a forwarded request (headers received) in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            authority: "127.0.0.1:3000".to_string(),
            connect_timeout_ms: 2_000,
            request_timeout_ms: 10_000,
        }
    }
}

/// Header rewriting on the forwarding path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Headers removed from both the forwarded request and the relayed response.
    pub strip_headers: Vec<String>,

    /// Headers set on every forwarded request.
    pub add_request_headers: BTreeMap<String, String>,

    /// Append X-Forwarded-For / -Proto / -Host.
    pub forwarded_headers: bool,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            strip_headers: vec!["server".to_string(), "x-powered-by".to_string()],
            add_request_headers: BTreeMap::new(),
            forwarded_headers: true,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Inbound request timeout (whole handler) in seconds.
    pub request_secs: u64,

    /// Upper bound for a single check invocation in milliseconds.
    pub check_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            check_ms: 1_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per window per client.
    pub capacity: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Entries idle for longer than this are evicted.
    pub idle_evict_secs: u64,

    /// How often the eviction sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            window_ms: 1_000,
            idle_evict_secs: 60,
            sweep_interval_secs: 30,
        }
    }
}

/// Per-route override of the rate limit budget.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct RateLimitOverride {
    pub capacity: u32,
    pub window_ms: u64,
}

/// Token verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for HS256 tokens. Empty means "read from `secret_env`".
    pub secret: String,

    /// Environment variable consulted when `secret` is empty.
    pub secret_env: String,

    /// Clock skew tolerated for `exp`/`nbf`, in seconds.
    pub leeway_secs: u64,

    /// Reject tokens that carry no `exp` claim.
    pub require_exp: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            secret_env: "JWT_SECRET".to_string(),
            leeway_secs: 30,
            require_exp: true,
        }
    }
}

/// SSRF guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Hosts a request-supplied target may point at.
    pub allowed_hosts: Vec<String>,

    /// Query parameter (with `[]`/`[N]` forms) and JSON body field carrying the target.
    pub field: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            field: "url".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentTypeConfig {
    /// Media types accepted on body-bearing methods.
    pub accepted: Vec<String>,
}

impl Default for ContentTypeConfig {
    fn default() -> Self {
        Self {
            accepted: vec!["application/json".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Header that must be present on body-bearing methods.
    pub header: String,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            header: "content-hash".to_string(),
        }
    }
}

/// Response header hygiene.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// Identifying response headers removed by the `header_hygiene` check.
    pub strip_response: Vec<String>,

    /// Attach the hardened security header set to every response.
    pub security_headers: bool,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            strip_response: vec!["x-powered-by".to_string(), "server".to_string()],
            security_headers: true,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// Redirect plain-HTTP requests to HTTPS (`transport_security` check).
    pub enforce_https: bool,

    /// Authority used in the HTTPS redirect `Location`. When unset the
    /// inbound `Host` header is echoed.
    pub public_host: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024, // 10kb
            enforce_https: false,
            public_host: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// The checks a route can declare, in config spelling.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    RateLimit,
    TransportSecurity,
    Authentication,
    Target,
    Sanitize,
    Schema,
    HeaderHygiene,
    ContentType,
    Integrity,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::RateLimit => "rate_limit",
            CheckKind::TransportSecurity => "transport_security",
            CheckKind::Authentication => "authentication",
            CheckKind::Target => "target",
            CheckKind::Sanitize => "sanitize",
            CheckKind::Schema => "schema",
            CheckKind::HeaderHygiene => "header_hygiene",
            CheckKind::ContentType => "content_type",
            CheckKind::Integrity => "integrity",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check list wrapper so the catch-all default can be expressed in one place.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DefaultChecks(pub Vec<CheckKind>);

impl Default for DefaultChecks {
    fn default() -> Self {
        Self(vec![
            CheckKind::RateLimit,
            CheckKind::TransportSecurity,
            CheckKind::HeaderHygiene,
            CheckKind::Authentication,
            CheckKind::ContentType,
            CheckKind::Sanitize,
            CheckKind::Target,
        ])
    }
}

/// Route configuration mapping requests to an ordered check sequence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Methods this route applies to (empty = any).
    #[serde(default)]
    pub methods: Vec<String>,

    /// Checks in evaluation order.
    pub checks: Vec<CheckKind>,

    /// Route-specific rate limit budget.
    #[serde(default)]
    pub rate_limit: Option<RateLimitOverride>,

    /// Declared request body shape for the `schema` check.
    #[serde(default)]
    pub schema: Option<BodySchema>,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

fn default_path_prefix() -> String {
    "/".to_string()
}

impl RouteConfig {
    /// The catch-all route built from `default_checks`.
    pub fn catch_all(checks: &DefaultChecks) -> Self {
        Self {
            name: "default".to_string(),
            path_prefix: default_path_prefix(),
            methods: Vec::new(),
            checks: checks.0.clone(),
            rate_limit: None,
            schema: None,
            priority: 0,
        }
    }
}

/// Declared JSON body shape.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct BodySchema {
    pub fields: BTreeMap<String, FieldSchema>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FieldSchema {
    #[serde(rename = "type", default)]
    pub kind: FieldKind,

    #[serde(default)]
    pub required: bool,

    /// Maximum length for strings (characters) and arrays (elements).
    #[serde(default)]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl GatewayConfig {
    /// Routes in effect: the configured ones, or the catch-all.
    pub fn effective_routes(&self) -> Vec<RouteConfig> {
        if self.routes.is_empty() {
            vec![RouteConfig::catch_all(&self.default_checks)]
        } else {
            self.routes.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.rate_limit.capacity, 10);
        assert_eq!(config.rate_limit.window_ms, 1_000);
        assert_eq!(config.security.max_body_size, 10 * 1024);
        assert_eq!(config.effective_routes().len(), 1);
        assert_eq!(config.effective_routes()[0].checks[0], CheckKind::RateLimit);
    }

    #[test]
    fn test_route_with_schema_parses() {
        let raw = r#"
            [origin]
            authority = "10.0.0.5:8080"

            [[routes]]
            name = "posts"
            path_prefix = "/api/posts"
            methods = ["POST"]
            checks = ["rate_limit", "authentication", "content_type", "schema"]
            rate_limit = { capacity = 5, window_ms = 2000 }

            [routes.schema.fields.title]
            type = "string"
            required = true
            max_length = 120
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.origin.authority, "10.0.0.5:8080");

        let route = &config.routes[0];
        assert_eq!(route.checks.len(), 4);
        assert_eq!(route.rate_limit, Some(RateLimitOverride { capacity: 5, window_ms: 2000 }));
        let title = &route.schema.as_ref().unwrap().fields["title"];
        assert_eq!(title.kind, FieldKind::String);
        assert!(title.required);
        assert_eq!(title.max_length, Some(120));
    }

    #[test]
    fn test_unknown_check_name_is_rejected() {
        let raw = r#"
            [[routes]]
            name = "r"
            checks = ["rate_limit", "magic"]
        "#;
        assert!(toml::from_str::<GatewayConfig>(raw).is_err());
    }
}
