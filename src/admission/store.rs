//! Counting stores holding per-caller bucket state.
//!
//! # Responsibilities
//! - Own every [`TokenBucket`], keyed by caller key
//! - Make refill-and-decrement atomic per key
//! - Drop buckets of callers that went quiet
//!
//! # Design Decisions
//! - One mutex per key inside a sharded map; keys never share a lock
//! - The map lock is released before the bucket lock is taken
//! - Eviction marks a bucket dead under its own lock, so a request that
//!   raced the sweeper retries against a live bucket instead of spending
//!   a token nobody will ever see

use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture};

use crate::admission::bucket::{AdmissionDecision, TokenBucket};
use crate::config::BucketPolicy;

/// Error type for counting-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// Shared counting store behind the admission controller.
///
/// Implementations backed by an external service must keep the same
/// per-key atomicity: one refill-and-take per call, never interleaved.
pub trait BucketStore: Send + Sync + 'static {
    /// Refill and try to take one token for `key`.
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        policy: BucketPolicy,
        now: Instant,
    ) -> BoxFuture<'a, Result<AdmissionDecision, StoreError>>;

    /// Remove buckets idle for at least `idle`. Returns how many were removed.
    ///
    /// Stores with their own expiry can leave this as a no-op.
    fn evict_idle(&self, _now: Instant, _idle: Duration) -> usize {
        0
    }

    /// Number of buckets currently held.
    fn tracked_keys(&self) -> usize {
        0
    }
}

#[derive(Debug)]
struct Slot {
    bucket: TokenBucket,
    evicted: bool,
}

/// In-process store; the default.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    buckets: DashMap<String, Arc<Mutex<Slot>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous acquire, usable without a runtime.
    pub fn try_acquire(&self, key: &str, policy: &BucketPolicy, now: Instant) -> AdmissionDecision {
        loop {
            let slot = self.slot(key, policy, now);
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.evicted {
                continue;
            }
            return guard.bucket.try_acquire(policy, now);
        }
    }

    fn slot(&self, key: &str, policy: &BucketPolicy, now: Instant) -> Arc<Mutex<Slot>> {
        if let Some(existing) = self.buckets.get(key) {
            return Arc::clone(existing.value());
        }
        let entry = self.buckets.entry(key.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(Slot {
                bucket: TokenBucket::full(policy, now),
                evicted: false,
            }))
        });
        Arc::clone(entry.value())
    }

    /// Current token count for a key, if tracked.
    pub fn tokens(&self, key: &str) -> Option<f64> {
        let slot = self.buckets.get(key).map(|s| Arc::clone(s.value()))?;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Some(guard.bucket.tokens())
    }
}

impl BucketStore for InMemoryStore {
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        policy: BucketPolicy,
        now: Instant,
    ) -> BoxFuture<'a, Result<AdmissionDecision, StoreError>> {
        Box::pin(future::ready(Ok(self.try_acquire(key, &policy, now))))
    }

    fn evict_idle(&self, now: Instant, idle: Duration) -> usize {
        let mut removed = 0;
        self.buckets.retain(|_, slot| {
            let mut guard = match slot.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                // Someone is deciding right now, so it is not idle.
                Err(TryLockError::WouldBlock) => return true,
            };
            if now.saturating_duration_since(guard.bucket.last_refill()) >= idle {
                guard.evicted = true;
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn policy(capacity: u32, rate: f64) -> BucketPolicy {
        BucketPolicy {
            capacity,
            refill_per_second: rate,
        }
    }

    #[test]
    fn test_new_key_starts_full() {
        let store = InMemoryStore::new();
        let p = policy(3, 1.0);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(store.try_acquire("ip:1.1.1.1", &p, now).allowed);
        }
        assert!(!store.try_acquire("ip:1.1.1.1", &p, now).allowed);
        // other callers are unaffected
        assert!(store.try_acquire("ip:2.2.2.2", &p, now).allowed);
    }

    #[test]
    fn test_last_token_never_double_spent() {
        let store = Arc::new(InMemoryStore::new());
        let p = policy(1, 0.001);
        let now = Instant::now();
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let allowed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                let allowed = allowed.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if store.try_acquire("key:shared", &p, now).allowed {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(allowed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_evicts_only_idle_keys() {
        let store = InMemoryStore::new();
        let p = policy(2, 1.0);
        let t0 = Instant::now();
        store.try_acquire("quiet", &p, t0);
        store.try_acquire("busy", &p, t0 + Duration::from_secs(9));

        let removed = store.evict_idle(t0 + Duration::from_secs(10), Duration::from_secs(10));
        assert_eq!(removed, 1);
        assert_eq!(store.tracked_keys(), 1);
        assert!(store.tokens("quiet").is_none());
        assert!(store.tokens("busy").is_some());
    }

    #[test]
    fn test_evicted_key_restarts_full() {
        let store = InMemoryStore::new();
        let p = policy(1, 1.0);
        let t0 = Instant::now();
        assert!(store.try_acquire("k", &p, t0).allowed);

        store.evict_idle(t0 + Duration::from_secs(5), Duration::from_secs(5));
        assert!(store.try_acquire("k", &p, t0 + Duration::from_secs(5)).allowed);
        assert_eq!(store.tokens("k"), Some(0.0));
    }

    #[test]
    fn test_held_slot_survives_sweep() {
        let store = InMemoryStore::new();
        let p = policy(1, 1.0);
        let t0 = Instant::now();
        store.try_acquire("k", &p, t0);

        let slot = store.slot("k", &p, t0);
        let _guard = slot.lock().unwrap();
        let removed = store.evict_idle(t0 + Duration::from_secs(60), Duration::from_secs(1));
        assert_eq!(removed, 0);
        assert_eq!(store.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn test_trait_acquire() {
        let store: Arc<dyn BucketStore> = Arc::new(InMemoryStore::new());
        let decision = store.acquire("k", policy(1, 1.0), Instant::now()).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(store.tracked_keys(), 1);
    }
}
