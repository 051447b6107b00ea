//! Per-request context.
//!
//! # Data Flow
//! ```text
//! Inbound headers + peer address
//!     → admission::CallerIdentity (rate-limit subject)
//!     → correlation.rs (reuse or generate X-Correlation-ID, bind span)
//!     → RequestContext inserted into request extensions
//!     → handlers extract it; pipeline echoes the ID on the response
//! ```

pub mod correlation;

pub use correlation::{attach, CorrelationId, Provenance, RequestContext, X_CORRELATION_ID};
