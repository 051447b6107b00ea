//! Token bucket state for a single caller.

use std::time::{Duration, Instant};

use crate::config::BucketPolicy;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionDecision {
    pub allowed: bool,
    /// How long until a token is available; `None` when allowed.
    pub retry_after: Option<Duration>,
}

impl AdmissionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    pub fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }

    /// `Retry-After` header value: whole seconds, rounded up, at least 1.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after
            .map(|d| (d.as_secs_f64().ceil() as u64).max(1))
    }
}

/// Lazily refilled token bucket.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket; new callers pay no cold-start penalty.
    pub fn full(policy: &BucketPolicy, now: Instant) -> Self {
        Self {
            tokens: f64::from(policy.capacity),
            last_refill: now,
        }
    }

    /// Refill for the time elapsed since the last call, then try to take a token.
    pub fn try_acquire(&mut self, policy: &BucketPolicy, now: Instant) -> AdmissionDecision {
        let capacity = f64::from(policy.capacity);
        let rate = policy.refill_per_second;

        // `now` may trail `last_refill` when callers race to pass timestamps.
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            AdmissionDecision::allow()
        } else {
            let wait = (1.0 - self.tokens) / rate;
            AdmissionDecision::deny(Duration::from_secs_f64(wait.max(0.0)))
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }
}
