//! Admission decisions over a counting store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::admission::bucket::AdmissionDecision;
use crate::admission::caller::CallerIdentity;
use crate::admission::store::{BucketStore, InMemoryStore};
use crate::config::{AdmissionConfig, FailMode};
use crate::observability::metrics;

/// Wait suggested to callers rejected because the store could not answer.
const STORE_FAILURE_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Decides whether a request may reach its handler.
#[derive(Clone)]
pub struct AdmissionController {
    store: Arc<dyn BucketStore>,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn BucketStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn BucketStore> {
        &self.store
    }

    /// Check one request from `caller` against its class policy.
    ///
    /// Never fails: store errors and timeouts resolve per `config.fail_mode`.
    pub async fn admit(
        &self,
        caller: &CallerIdentity,
        config: &AdmissionConfig,
        now: Instant,
    ) -> AdmissionDecision {
        let policy = config.policy_for(caller.class);
        let attempt = self.store.acquire(&caller.key, policy, now);

        let failure = match tokio::time::timeout(config.store_timeout(), attempt).await {
            Ok(Ok(decision)) => {
                if !decision.allowed {
                    tracing::warn!(
                        caller = %caller.key,
                        class = caller.class,
                        retry_after_secs = decision.retry_after_secs(),
                        "Rate limit exceeded"
                    );
                    metrics::record_admission_rejected(caller.class, "rate_limited");
                }
                return decision;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("store did not answer within {:?}", config.store_timeout()),
        };

        match config.fail_mode {
            FailMode::Open => {
                tracing::warn!(caller = %caller.key, error = %failure, "Admission store failed, failing open");
                AdmissionDecision::allow()
            }
            FailMode::Closed => {
                tracing::error!(caller = %caller.key, error = %failure, "Admission store failed, failing closed");
                metrics::record_admission_rejected(caller.class, "store_failure");
                AdmissionDecision::deny(STORE_FAILURE_RETRY_AFTER)
            }
        }
    }
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("tracked_keys", &self.store.tracked_keys())
            .finish()
    }
}
