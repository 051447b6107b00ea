//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the BFF gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment mode (controls error detail exposure and log format).
    pub mode: Mode,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Admission control (rate limiting) settings.
    pub admission: AdmissionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// CORS settings for the browser client.
    pub cors: CorsConfig,

    /// Security hardening settings.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Internal error text is never sent to clients.
    #[default]
    Production,
    /// Internal error text is exposed in a `detail` field.
    Development,
}

impl Mode {
    pub fn is_development(self) -> bool {
        self == Mode::Development
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "development" | "dev" => Ok(Mode::Development),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Token bucket parameters for one caller class.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct BucketPolicy {
    /// Maximum burst size (tokens in a full bucket).
    pub capacity: u32,

    /// Tokens added back per second.
    pub refill_per_second: f64,
}

impl Default for BucketPolicy {
    fn default() -> Self {
        Self {
            capacity: 100,
            refill_per_second: 10.0,
        }
    }
}

/// What the gateway does when the counting store cannot answer in time.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Reject the request.
    #[default]
    Closed,
    /// Admit the request.
    Open,
}

/// Admission control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Enable admission control.
    pub enabled: bool,

    /// Policy used for any caller class without an explicit entry.
    pub default_policy: BucketPolicy,

    /// Per caller class policies (`anonymous`, `api_key`).
    pub classes: HashMap<String, BucketPolicy>,

    /// Header identifying API-key callers.
    pub api_key_header: String,

    /// Keys honoured in `api_key_header`. A key not listed here is ignored
    /// and the caller is limited by IP; with no keys listed every caller is.
    pub api_keys: HashSet<String>,

    /// Paths that bypass admission control entirely.
    pub exempt_paths: Vec<String>,

    /// Buckets untouched for this long are evicted.
    pub idle_eviction_secs: u64,

    /// How often the eviction sweeper runs.
    pub sweep_interval_secs: u64,

    /// Deadline for a single counting-store call.
    pub store_timeout_ms: u64,

    /// Behavior when the store errors or times out.
    pub fail_mode: FailMode,
}

impl AdmissionConfig {
    pub fn idle_eviction(&self) -> Duration {
        Duration::from_secs(self.idle_eviction_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Policy for a caller class, falling back to the default policy.
    pub fn policy_for(&self, class: &str) -> BucketPolicy {
        self.classes
            .get(class)
            .copied()
            .unwrap_or(self.default_policy)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_policy: BucketPolicy::default(),
            classes: HashMap::new(),
            api_key_header: "x-api-key".to_string(),
            api_keys: HashSet::new(),
            exempt_paths: vec!["/health".to_string(), "/ready".to_string()],
            idle_eviction_secs: 600,
            sweep_interval_secs: 60,
            store_timeout_ms: 50,
            fail_mode: FailMode::Closed,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a route handler, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins the browser client may call from.
    pub allowed_origins: Vec<String>,

    /// Allow cookies / credentials on cross-origin requests.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
            allow_credentials: true,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format. Defaults to JSON in production and pretty in development.
    pub log_format: Option<LogFormat>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
