//! Hot-swappable runtime settings.
//!
//! The pipeline reads one snapshot per request, so a reload never changes
//! the policy halfway through a single admission decision.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, Guard};

use crate::config::schema::{AdmissionConfig, GatewayConfig, Mode};

/// The subset of configuration that may change while serving.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: Mode,
    pub admission: AdmissionConfig,
    pub request_timeout: Duration,
}

impl From<&GatewayConfig> for Settings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            mode: config.mode,
            admission: config.admission.clone(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        }
    }
}

/// Shared handle to the current [`Settings`].
#[derive(Clone)]
pub struct RuntimeSettings {
    inner: Arc<ArcSwap<Settings>>,
}

impl RuntimeSettings {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(Settings::from(config))),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Guard<Arc<Settings>> {
        self.inner.load()
    }

    /// Owned snapshot, safe to hold across `.await`.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.inner.load_full()
    }

    /// Replace the settings from a freshly loaded configuration.
    pub fn replace(&self, config: &GatewayConfig) {
        self.inner.store(Arc::new(Settings::from(config)));
    }
}

impl std::fmt::Debug for RuntimeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSettings")
            .field("current", &**self.inner.load())
            .finish()
    }
}
