//! Security gateway library.
//!
//! Every inbound request is bound to a route, evaluated by that route's
//! ordered check pipeline, and forwarded to the single origin only if every
//! check allowed it.

// Core request path
pub mod checks;
pub mod config;
pub mod gateway;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use gateway::Gateway;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
