//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → runtime settings shared via ArcSwap
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the runtime settings
//!     → next request observes new policies
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only runtime settings (mode, bucket policies) hot reload; the listener
//!   address and middleware stack are fixed at startup

pub mod loader;
pub mod runtime;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use runtime::{RuntimeSettings, Settings};
pub use schema::{
    AdmissionConfig, BucketPolicy, CorsConfig, FailMode, GatewayConfig, ListenerConfig,
    LogFormat, Mode, ObservabilityConfig, SecurityConfig, TimeoutConfig,
};
