//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, resolve secrets from env)
//!     → validation.rs (semantic checks, check ordering rules)
//!     → GatewayConfig (validated, immutable)
//!     → consumed once at startup to build pipelines and the forwarder
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; check order is a deployment-time decision
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BodySchema, CheckKind, FieldKind, FieldSchema, GatewayConfig, LogFormat, RateLimitOverride,
    RouteConfig,
};
