//! Admission control (rate limiting).
//!
//! # Data Flow
//! ```text
//! RequestContext.caller (caller.rs)
//!     → controller.rs (policy lookup, store timeout, fail mode)
//!     → store.rs (per-key lock, bucket.rs refill-and-take)
//!     → AdmissionDecision back to the pipeline
//!
//! Background:
//!     sweeper.rs → store.evict_idle() every sweep interval
//! ```
//!
//! # Design Decisions
//! - Token bucket per caller key, full on first sight
//! - Fail closed by default when the store cannot answer
//! - Consumed tokens are never refunded, even if the client disconnects

pub mod bucket;
pub mod caller;
pub mod controller;
pub mod store;
pub mod sweeper;

pub use bucket::{AdmissionDecision, TokenBucket};
pub use caller::{CallerIdentity, ANONYMOUS_CLASS, API_KEY_CLASS};
pub use controller::AdmissionController;
pub use store::{BucketStore, InMemoryStore, StoreError};
pub use sweeper::EvictionSweeper;
