//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, capacities > 0, parseable addresses)
//! - Enforce check ordering rules per route
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use axum::http::uri::Authority;
use axum::http::{HeaderName, HeaderValue, Method};

use crate::config::schema::{CheckKind, GatewayConfig, RouteConfig};

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidBindAddress(String),
    InvalidOriginAuthority(String),
    InvalidPublicHost(String),
    ZeroValue(&'static str),
    InvalidHeaderName(String),
    InvalidHeaderValue(String),
    InvalidAllowedHost(String),
    InvalidMediaType(String),
    MissingAuthSecret,
    DuplicateRouteName(String),
    InvalidPathPrefix { route: String, prefix: String },
    InvalidMethod { route: String, method: String },
    EmptyCheckList(String),
    DuplicateCheck { route: String, check: CheckKind },
    RateLimitNotFirst(String),
    CheckBeforeAuthentication { route: String, check: CheckKind },
    MissingSchema(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidBindAddress(a) => write!(f, "invalid bind address '{}'", a),
            ValidationError::InvalidOriginAuthority(a) => write!(f, "invalid origin authority '{}'", a),
            ValidationError::InvalidPublicHost(h) => write!(f, "invalid public host '{}'", h),
            ValidationError::ZeroValue(field) => write!(f, "{} must be greater than zero", field),
            ValidationError::InvalidHeaderName(h) => write!(f, "invalid header name '{}'", h),
            ValidationError::InvalidHeaderValue(h) => write!(f, "invalid value for header '{}'", h),
            ValidationError::InvalidAllowedHost(h) => write!(f, "invalid allow-listed host '{}'", h),
            ValidationError::InvalidMediaType(m) => write!(f, "invalid media type '{}'", m),
            ValidationError::MissingAuthSecret => {
                write!(f, "authentication is used but no token secret is configured")
            }
            ValidationError::DuplicateRouteName(r) => write!(f, "duplicate route name '{}'", r),
            ValidationError::InvalidPathPrefix { route, prefix } => {
                write!(f, "route '{}': path prefix '{}' must start with '/'", route, prefix)
            }
            ValidationError::InvalidMethod { route, method } => {
                write!(f, "route '{}': invalid method '{}'", route, method)
            }
            ValidationError::EmptyCheckList(r) => write!(f, "route '{}' declares no checks", r),
            ValidationError::DuplicateCheck { route, check } => {
                write!(f, "route '{}': check '{}' listed more than once", route, check)
            }
            ValidationError::RateLimitNotFirst(r) => {
                write!(f, "route '{}': rate_limit must be the first check", r)
            }
            ValidationError::CheckBeforeAuthentication { route, check } => {
                write!(f, "route '{}': '{}' must come after authentication", route, check)
            }
            ValidationError::MissingSchema(r) => {
                write!(f, "route '{}': schema check declared without a schema", r)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }
    if config.origin.authority.parse::<Authority>().is_err() {
        errors.push(ValidationError::InvalidOriginAuthority(config.origin.authority.clone()));
    }
    if let Some(host) = &config.security.public_host {
        // Host and optional port only; userinfo has no place in a redirect.
        if host.contains('@') || host.parse::<Authority>().is_err() {
            errors.push(ValidationError::InvalidPublicHost(host.clone()));
        }
    }

    for (value, field) in [
        (config.origin.connect_timeout_ms, "origin.connect_timeout_ms"),
        (config.origin.request_timeout_ms, "origin.request_timeout_ms"),
        (config.timeouts.request_secs, "timeouts.request_secs"),
        (config.timeouts.check_ms, "timeouts.check_ms"),
        (config.rate_limit.window_ms, "rate_limit.window_ms"),
        (config.rate_limit.sweep_interval_secs, "rate_limit.sweep_interval_secs"),
        (config.security.max_body_size as u64, "security.max_body_size"),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(field));
        }
    }
    if config.rate_limit.capacity == 0 {
        errors.push(ValidationError::ZeroValue("rate_limit.capacity"));
    }

    for name in config.forward.strip_headers.iter().chain(&config.headers.strip_response) {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(name.clone()));
        }
    }
    for (name, value) in &config.forward.add_request_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(name.clone()));
        } else if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeaderValue(name.clone()));
        }
    }
    if HeaderName::from_bytes(config.integrity.header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName(config.integrity.header.clone()));
    }

    for host in &config.target.allowed_hosts {
        if url::Host::parse(host).is_err() {
            errors.push(ValidationError::InvalidAllowedHost(host.clone()));
        }
    }
    for media in &config.content_type.accepted {
        if !media.contains('/') || media.contains(';') {
            errors.push(ValidationError::InvalidMediaType(media.clone()));
        }
    }

    let routes = config.effective_routes();
    let mut names = HashSet::new();
    let mut needs_secret = false;
    for route in &routes {
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRouteName(route.name.clone()));
        }
        needs_secret |= route.checks.contains(&CheckKind::Authentication);
        validate_route(route, &mut errors);
    }

    if needs_secret && config.auth.secret.is_empty() {
        errors.push(ValidationError::MissingAuthSecret);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    let name = &route.name;

    if !route.path_prefix.starts_with('/') {
        errors.push(ValidationError::InvalidPathPrefix {
            route: name.clone(),
            prefix: route.path_prefix.clone(),
        });
    }
    for method in &route.methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidMethod {
                route: name.clone(),
                method: method.clone(),
            });
        }
    }
    if let Some(limit) = route.rate_limit {
        if limit.capacity == 0 {
            errors.push(ValidationError::ZeroValue("routes.rate_limit.capacity"));
        }
        if limit.window_ms == 0 {
            errors.push(ValidationError::ZeroValue("routes.rate_limit.window_ms"));
        }
    }

    if route.checks.is_empty() {
        errors.push(ValidationError::EmptyCheckList(name.clone()));
        return;
    }

    let mut seen = HashSet::new();
    for check in &route.checks {
        if !seen.insert(*check) {
            errors.push(ValidationError::DuplicateCheck {
                route: name.clone(),
                check: *check,
            });
        }
    }

    if let Some(pos) = route.checks.iter().position(|c| *c == CheckKind::RateLimit) {
        if pos != 0 {
            errors.push(ValidationError::RateLimitNotFirst(name.clone()));
        }
    }

    // Content work only happens on traffic that already authenticated.
    if let Some(auth) = route.checks.iter().position(|c| *c == CheckKind::Authentication) {
        for (pos, check) in route.checks.iter().enumerate() {
            let content_check = matches!(check, CheckKind::Sanitize | CheckKind::Schema | CheckKind::Target);
            if content_check && pos < auth {
                errors.push(ValidationError::CheckBeforeAuthentication {
                    route: name.clone(),
                    check: *check,
                });
            }
        }
    }

    if route.checks.contains(&CheckKind::Schema) && route.schema.is_none() {
        errors.push(ValidationError::MissingSchema(name.clone()));
    }
}
