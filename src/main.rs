//! WAF gateway binary.
//!
//! ```text
//!     Client ──▶ listener ──▶ route ──▶ pipeline ─────────────▶ forwarder ──▶ Origin
//!                                        │ rate_limit                │
//!                                        │ transport_security        │
//!                                        │ authentication            ▼
//!                                        │ ...               response hardening
//!                                        ▼                           │
//!                                  Deny / 500 ◀──────────────────────┘──▶ Client
//!                                        │
//!                                        └──▶ one PipelineOutcome per request → sinks
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use waf_gateway::lifecycle::signals::spawn_signal_listener;
use waf_gateway::lifecycle::startup::{prepare_config, start, Overrides};
use waf_gateway::lifecycle::Shutdown;
use waf_gateway::observability::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "waf-gateway", version, about = "Security gateway in front of a single HTTP origin")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "WAF_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Origin authority (`host:port`), overriding `origin.authority`.
    #[arg(long)]
    origin: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let overrides = Overrides {
        bind: args.bind,
        origin: args.origin,
    };

    // Logging depends on the config, so config errors go to stderr.
    let config = match prepare_config(args.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("waf-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("waf-gateway: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "waf-gateway starting");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    match start(config, shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}
