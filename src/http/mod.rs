//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace layers)
//!     → gateway::Gateway::handle (body limit, routing, pipeline, forward)
//!     → response.rs (JSON errors, request ID + security headers)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use server::HttpServer;
