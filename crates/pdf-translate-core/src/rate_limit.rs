//! Fixed-window request limiting per client identifier
//!
//! Bucket state lives behind [`BucketStore`] so the counting algorithm does not
//! care whether buckets are held in process or elsewhere. Expired buckets are
//! swept inline on every check; there is no background task.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::RateLimitConfig;

/// Request count for one identifier within its current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBucket {
    pub count: u32,
    pub reset_at: Instant,
}

/// Storage for rate buckets keyed by client identifier
pub trait BucketStore: Send + Sync {
    fn get(&self, identifier: &str) -> Option<RateBucket>;

    fn set(&self, identifier: &str, bucket: RateBucket);

    /// Remove every bucket whose window has ended at `now`; returns how many
    fn sweep(&self, now: Instant) -> usize;
}

/// Process-local bucket map
#[derive(Debug, Default)]
pub struct InMemoryBucketStore {
    buckets: Mutex<HashMap<String, RateBucket>>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live buckets
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }
}

impl BucketStore for InMemoryBucketStore {
    fn get(&self, identifier: &str) -> Option<RateBucket> {
        self.buckets.lock().get(identifier).copied()
    }

    fn set(&self, identifier: &str, bucket: RateBucket) {
        self.buckets.lock().insert(identifier.to_string(), bucket);
    }

    fn sweep(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.reset_at > now);
        before - buckets.len()
    }
}

/// Outcome of a single limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Whole seconds until the window resets; 0 when allowed
    pub retry_after_seconds: u64,
    pub limit: u32,
}

/// Fixed-window counter shared by all requests of the process
pub struct RateLimiter<S = InMemoryBucketStore> {
    config: RateLimitConfig,
    store: S,
    // get/set on the store are separate calls; this makes each check atomic
    check_lock: Mutex<()>,
}

impl RateLimiter<InMemoryBucketStore> {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_store(config, InMemoryBucketStore::new())
    }
}

impl<S: BucketStore> RateLimiter<S> {
    pub fn with_store(config: RateLimitConfig, store: S) -> Self {
        Self {
            config,
            store,
            check_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Count a request from `identifier` against its window
    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        self.check_at(identifier, Instant::now())
    }

    /// [`RateLimiter::check`] with an explicit clock reading
    pub fn check_at(&self, identifier: &str, now: Instant) -> RateLimitDecision {
        let _guard = self.check_lock.lock();
        let limit = self.config.max_requests;

        self.store.sweep(now);

        match self.store.get(identifier) {
            Some(bucket) if bucket.reset_at > now => {
                if bucket.count >= limit {
                    return RateLimitDecision {
                        allowed: false,
                        retry_after_seconds: retry_after(bucket.reset_at, now),
                        limit,
                    };
                }

                self.store.set(
                    identifier,
                    RateBucket {
                        count: bucket.count + 1,
                        reset_at: bucket.reset_at,
                    },
                );
            }
            _ => {
                self.store.set(
                    identifier,
                    RateBucket {
                        count: 1,
                        reset_at: window_end(now, self.config.window),
                    },
                );
            }
        }

        RateLimitDecision {
            allowed: true,
            retry_after_seconds: 0,
            limit,
        }
    }
}

/// End of a window opened at `now`.
///
/// A window too long for the clock to represent is shortened to the latest
/// reachable instant, which in practice never resets.
fn window_end(now: Instant, window: Duration) -> Instant {
    let mut span = window;
    loop {
        if let Some(end) = now.checked_add(span) {
            return end;
        }
        span /= 2;
    }
}

/// Seconds until `reset_at`, rounded up, never below one
fn retry_after(reset_at: Instant, now: Instant) -> u64 {
    let remaining = reset_at.saturating_duration_since(now);
    let secs = remaining
        .as_secs()
        .saturating_add(u64::from(remaining.subsec_nanos() > 0));
    secs.max(1)
}
