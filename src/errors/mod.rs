//! Failure taxonomy and classification.
//!
//! # Data Flow
//! ```text
//! Handler returns Err(GatewayError)       (failure.rs)
//!     → IntoResponse stashes HandlerFailure in the response extensions
//!     → pipeline finds it and calls classify() (classifier.rs)
//!     → ClassifiedError rendered as the JSON envelope (envelope.rs)
//! ```
//!
//! # Design Decisions
//! - Every failure maps to exactly one kind; `Internal` is the catch-all
//! - Internal messages are logged, never sent, outside development mode

pub mod classifier;
pub mod envelope;
pub mod failure;

pub use classifier::{classify, ClassifiedError, ErrorKind};
pub use envelope::ErrorEnvelope;
pub use failure::{GatewayError, HandlerFailure};
