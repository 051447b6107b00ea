//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, peer address, graceful shutdown)
//!     → TraceLayer → security headers → pipeline
//!     → routes.rs (health, ready, info, 404) or the mounted /api router
//! ```

pub mod routes;
pub mod server;

pub use server::{GatewayServer, ServerError};
