//! Per-client admission control
//!
//! Keys are tracked by a governor keyed limiter (GCRA over a sharded map).
//! Sweeping swaps the whole limiter for an empty one.

pub mod middleware;
pub mod sweeper;

use std::num::NonZeroU32;
use std::sync::{Arc, PoisonError, RwLock};

use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota,
};

use crate::config::RateLimitConfig;

pub use sweeper::{spawn_sweeper, SweeperHandle};

type KeyedLimiter<C> = governor::RateLimiter<
    String,
    DefaultKeyedStateStore<String>,
    C,
    NoOpMiddleware<<C as Clock>::Instant>,
>;

/// `per_minute` sustained requests with bursts of up to `burst`; zeroes are raised to 1
pub fn quota(per_minute: u32, burst: u32) -> Quota {
    let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::per_minute(per_minute).allow_burst(burst)
}

#[derive(Clone)]
pub struct RateLimiter<C: Clock = DefaultClock> {
    quota: Quota,
    clock: C,
    inner: Arc<RwLock<Arc<KeyedLimiter<C>>>>,
}

impl RateLimiter {
    pub fn new(quota: Quota) -> Self {
        Self::with_clock(quota, DefaultClock::default())
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(quota(config.requests_per_minute, config.burst))
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(quota: Quota, clock: C) -> Self {
        let limiter = governor::RateLimiter::dashmap_with_clock(quota, &clock);
        Self {
            quota,
            clock,
            inner: Arc::new(RwLock::new(Arc::new(limiter))),
        }
    }

    fn current(&self) -> Arc<KeyedLimiter<C>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Admit or reject one request from `key`
    pub fn allow(&self, key: &str) -> bool {
        self.current().check_key(&key.to_string()).is_ok()
    }

    /// Number of clients with limiter state
    pub fn tracked_keys(&self) -> usize {
        self.current().len()
    }

    /// Forget every client once more than `threshold` keys are tracked.
    /// Returns how many were dropped. Forgotten clients start again with a
    /// full burst.
    pub fn sweep(&self, threshold: usize) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let tracked = inner.len();
        if tracked <= threshold {
            return 0;
        }

        *inner = Arc::new(governor::RateLimiter::dashmap_with_clock(self.quota, &self.clock));
        tracked
    }
}
