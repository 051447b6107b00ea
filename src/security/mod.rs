//! HTTP hardening.
//!
//! # Data Flow
//! ```text
//! Response leaving the pipeline
//!     → headers.rs (security headers)
//!
//! Inside the pipeline:
//!     → cors.rs (origin grants, preflights)
//! ```
//!
//! The request body limit is part of the pipeline itself so that oversized
//! bodies are classified like any other failure.

pub mod cors;
pub mod headers;

pub use cors::cors_layer;
pub use headers::apply_security_headers;
