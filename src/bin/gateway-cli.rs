use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

use waf_gateway::config::{load_config, ConfigError};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator tooling for the WAF gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file and print the resulting routes
    CheckConfig {
        path: PathBuf,
    },
    /// Mint an HS256 bearer token accepted by the authentication check
    Token {
        /// Signing secret
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// Subject claim
        #[arg(long, default_value = "operator")]
        sub: String,

        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig { path } => match load_config(&path) {
            Ok(config) => {
                for route in config.effective_routes() {
                    let checks: Vec<_> = route.checks.iter().map(|c| c.as_str()).collect();
                    println!("{:<16} {:<20} {}", route.name, route.path_prefix, checks.join(" → "));
                }
                println!("OK");
            }
            Err(ConfigError::Validation(errors)) => {
                for error in &errors {
                    eprintln!("error: {}", error);
                }
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        },
        Commands::Token { secret, sub, ttl } => {
            let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
            let claims = json!({ "sub": sub, "iat": now, "exp": now + ttl });
            let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?;
            println!("{}", token);
        }
    }

    Ok(())
}
