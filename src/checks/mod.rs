//! Security checks.
//!
//! # Data Flow
//! ```text
//! RouteConfig.checks (ordered CheckKind list, validated)
//!     → build_check() per entry, with shared capabilities
//!     → Vec<Arc<dyn Check>> frozen into the route's Pipeline
//! ```
//!
//! # Design Decisions
//! - Checks are stateless apart from the capabilities they hold
//! - Capabilities (limiter, verifier, sanitizer) are shared across routes
//! - A route with a rate-limit override gets its own limiter

pub mod auth;
pub mod content_type;
pub mod header_hygiene;
pub mod integrity;
pub mod rate_limit;
pub mod sanitize;
pub mod schema;
pub mod target;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;
use url::Host;

use crate::config::{CheckKind, GatewayConfig, RouteConfig};
use crate::gateway::check::Check;
use crate::gateway::error::BuildError;
use crate::security::headers;
use crate::security::rate_limit::RateLimiter;
use crate::security::sanitize::Sanitizer;
use crate::security::token::TokenVerifier;

pub use auth::{AuthenticationCheck, VerifiedClaims};
pub use content_type::ContentTypeCheck;
pub use header_hygiene::HeaderHygieneCheck;
pub use integrity::IntegrityCheck;
pub use rate_limit::{RateBudget, RateLimitCheck};
pub use sanitize::SanitizeCheck;
pub use schema::SchemaCheck;
pub use target::TargetCheck;
pub use transport::TransportSecurityCheck;

/// Capabilities shared by every route's checks.
pub struct Capabilities {
    pub limiter: Arc<RateLimiter>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub sanitizer: Arc<dyn Sanitizer>,
    pub allowed_hosts: Vec<Host<String>>,
}

impl Capabilities {
    /// Parse the allow-list of target hosts.
    pub fn parse_allowed_hosts(hosts: &[String]) -> Result<Vec<Host<String>>, BuildError> {
        hosts
            .iter()
            .map(|h| {
                Host::parse(h).map_err(|source| BuildError::AllowedHost {
                    host: h.clone(),
                    source,
                })
            })
            .collect()
    }
}

/// Build the ordered checks of one route.
///
/// Every limiter created for a route override is pushed to `limiters` so the
/// caller can sweep it.
pub fn build_route_checks(
    config: &GatewayConfig,
    route: &RouteConfig,
    caps: &Capabilities,
    limiters: &mut Vec<Arc<RateLimiter>>,
) -> Result<Vec<Arc<dyn Check>>, BuildError> {
    route
        .checks
        .iter()
        .map(|kind| build_check(*kind, config, route, caps, limiters))
        .collect()
}

fn build_check(
    kind: CheckKind,
    config: &GatewayConfig,
    route: &RouteConfig,
    caps: &Capabilities,
    limiters: &mut Vec<Arc<RateLimiter>>,
) -> Result<Arc<dyn Check>, BuildError> {
    let check: Arc<dyn Check> = match kind {
        CheckKind::RateLimit => {
            let limiter = match &route.rate_limit {
                Some(limit) => {
                    let limiter = Arc::new(RateLimiter::new(
                        limit.capacity,
                        Duration::from_millis(limit.window_ms),
                        Duration::from_secs(config.rate_limit.idle_evict_secs),
                    ));
                    limiters.push(limiter.clone());
                    limiter
                }
                None => caps.limiter.clone(),
            };
            Arc::new(RateLimitCheck::new(limiter))
        }
        CheckKind::TransportSecurity => Arc::new(TransportSecurityCheck::new(
            config.security.enforce_https,
            config.security.public_host.clone(),
        )),
        CheckKind::Authentication => Arc::new(AuthenticationCheck::new(caps.verifier.clone())),
        CheckKind::Target => Arc::new(TargetCheck::new(caps.allowed_hosts.clone(), config.target.field.clone())),
        CheckKind::Sanitize => Arc::new(SanitizeCheck::new(caps.sanitizer.clone())),
        CheckKind::Schema => {
            let schema = route
                .schema
                .clone()
                .ok_or_else(|| BuildError::MissingSchema(route.name.clone()))?;
            Arc::new(SchemaCheck::new(schema))
        }
        CheckKind::HeaderHygiene => {
            Arc::new(HeaderHygieneCheck::new(headers::parse_names(&config.headers.strip_response)))
        }
        CheckKind::ContentType => Arc::new(ContentTypeCheck::new(&config.content_type.accepted)),
        CheckKind::Integrity => {
            let header = HeaderName::from_bytes(config.integrity.header.as_bytes())
                .map_err(|_| BuildError::HeaderName(config.integrity.header.clone()))?;
            Arc::new(IntegrityCheck::new(header))
        }
    };
    debug_assert_eq!(check.name(), kind.as_str());
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::sanitize::XssSanitizer;
    use crate::security::token::JwtVerifier;

    fn caps(config: &GatewayConfig) -> Capabilities {
        Capabilities {
            limiter: Arc::new(RateLimiter::new(10, Duration::from_secs(1), Duration::from_secs(60))),
            verifier: Arc::new(JwtVerifier::new(b"k", 0, true)),
            sanitizer: Arc::new(XssSanitizer::new().unwrap()),
            allowed_hosts: Capabilities::parse_allowed_hosts(&config.target.allowed_hosts).unwrap(),
        }
    }

    #[test]
    fn test_checks_built_in_declared_order() {
        let config = GatewayConfig::default();
        let route = RouteConfig::catch_all(&config.default_checks);
        let mut limiters = Vec::new();
        let checks = build_route_checks(&config, &route, &caps(&config), &mut limiters).unwrap();

        let names: Vec<_> = checks.iter().map(|c| c.name()).collect();
        let expected: Vec<_> = config.default_checks.0.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, expected);
        assert!(limiters.is_empty());
    }

    #[test]
    fn test_route_override_gets_own_limiter() {
        let config = GatewayConfig::default();
        let mut route = RouteConfig::catch_all(&config.default_checks);
        route.rate_limit = Some(crate::config::RateLimitOverride {
            capacity: 2,
            window_ms: 500,
        });
        let mut limiters = Vec::new();
        build_route_checks(&config, &route, &caps(&config), &mut limiters).unwrap();

        assert_eq!(limiters.len(), 1);
        assert_eq!(limiters[0].capacity(), 2);
    }

    #[test]
    fn test_schema_without_declaration_fails() {
        let config = GatewayConfig::default();
        let mut route = RouteConfig::catch_all(&config.default_checks);
        route.checks = vec![CheckKind::Schema];
        let err = build_route_checks(&config, &route, &caps(&config), &mut Vec::new()).err().unwrap();
        assert!(matches!(err, BuildError::MissingSchema(name) if name == "default"));
    }

    #[test]
    fn test_bad_allowed_host_rejected() {
        assert!(Capabilities::parse_allowed_hosts(&["bad host".into()]).is_err());
    }
}
