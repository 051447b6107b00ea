//! Backend-for-frontend gateway library.
//!
//! Every request passes through one fixed pipeline: correlation ID,
//! admission control, the route handler, and failure classification.

pub mod admission;
pub mod config;
pub mod context;
pub mod errors;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod security;

pub use config::schema::GatewayConfig;
pub use context::RequestContext;
pub use errors::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
