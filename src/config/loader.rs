//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    finalize(config)
}

/// Parse configuration text without validating it.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Resolve environment-provided values, then validate.
pub fn finalize(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    resolve_secret(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn resolve_secret(config: &mut GatewayConfig) {
    if !config.auth.secret.is_empty() || config.auth.secret_env.is_empty() {
        return;
    }
    match std::env::var(&config.auth.secret_env) {
        Ok(secret) if !secret.is_empty() => {
            tracing::debug!(env = %config.auth.secret_env, "Token secret loaded from environment");
            config.auth.secret = secret;
        }
        _ => {}
    }
}
