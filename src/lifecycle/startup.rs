//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration, apply command line overrides, validate
//! - Start the metrics exporter
//! - Build the gateway and bind the listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Overrides are applied before validation, so they are validated too
//! - Listener binds last (traffic only when pipelines are built)

use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::loader::{finalize, parse_config};
use crate::config::{ConfigError, GatewayConfig};
use crate::gateway::BuildError;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build gateway: {0}")]
    Build(#[from] BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Values given on the command line that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<String>,
    pub origin: Option<String>,
}

/// Read the config file (or start from defaults), apply overrides, validate.
pub fn prepare_config(path: Option<&Path>, overrides: &Overrides) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&std::fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = &overrides.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(origin) = &overrides.origin {
        config.origin.authority = origin.clone();
    }
    finalize(config)
}

/// Start every subsystem and serve until `shutdown` fires.
pub async fn start(config: GatewayConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin = %config.origin.authority,
        max_body_size = config.security.max_body_size,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config)?;

    let address = server.config().listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, shutdown).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_applied_before_validation() {
        let overrides = Overrides {
            bind: Some("not an address".into()),
            origin: None,
        };
        let err = prepare_config(None, &overrides).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert!(errors
                .iter()
                .any(|e| e.to_string().contains("not an address"))),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = prepare_config(Some(Path::new("/nonexistent/waf-gateway.toml")), &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
