//! Token bucket rate limiter for quote providers.
//!
//! Each provider gets its own bucket seeded from the limits the
//! adapter declares via [`RateLimit`](crate::provider::RateLimit).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::provider::RateLimit;

/// Token bucket for a single provider.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was updated.
    last_update: Instant,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
    /// Minimum spacing between requests.
    min_delay: Duration,
    /// Time of the last successful acquisition.
    last_acquire: Option<Instant>,
}

impl TokenBucket {
    fn from_limit(limit: &RateLimit) -> Self {
        let capacity = f64::from(limit.burst.max(1));
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: f64::from(limit.requests_per_minute.max(1)) / 60.0,
            capacity,
            min_delay: limit.min_delay,
            last_acquire: None,
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    /// Try to acquire a token immediately.
    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens < 1.0 {
            return false;
        }
        if let Some(last) = self.last_acquire {
            if last.elapsed() < self.min_delay {
                return false;
            }
        }

        self.tokens -= 1.0;
        self.last_acquire = Some(Instant::now());
        true
    }

    /// Calculate the wait time until a token becomes available.
    fn time_until_available(&mut self) -> Duration {
        self.refill();

        let token_wait = if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        };

        let spacing_wait = self
            .last_acquire
            .map(|last| self.min_delay.saturating_sub(last.elapsed()))
            .unwrap_or(Duration::ZERO);

        token_wait.max(spacing_wait)
    }
}

/// Token bucket rate limiter keyed by provider id.
///
/// Thread-safe; buckets are created from the limits registered for
/// each provider at startup. Unregistered providers fall back to the
/// default [`RateLimit`].
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    /// Create a new rate limiter with no registered providers.
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the buckets mutex, recovering from poison if necessary.
    ///
    /// Worst case after recovery is slightly incorrect throttling, which
    /// beats panicking in the request path.
    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register a provider's declared limits.
    ///
    /// Replaces any existing bucket for the provider.
    pub fn register(&self, provider: &str, limit: &RateLimit) {
        let mut buckets = self.lock_buckets();
        buckets.insert(provider.to_string(), TokenBucket::from_limit(limit));
    }

    /// Acquire a token for the given provider, waiting if necessary.
    pub async fn acquire(&self, provider: &str) {
        loop {
            let wait_time = {
                let mut buckets = self.lock_buckets();

                let bucket = buckets
                    .entry(provider.to_string())
                    .or_insert_with(|| TokenBucket::from_limit(&RateLimit::default()));

                if bucket.try_acquire() {
                    return;
                }

                bucket.time_until_available()
            };

            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait_time, provider
            );
            tokio::time::sleep(wait_time.max(Duration::from_millis(1))).await;
        }
    }

    /// Try to acquire a token without waiting.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let mut buckets = self.lock_buckets();

        let bucket = buckets
            .entry(provider.to_string())
            .or_insert_with(|| TokenBucket::from_limit(&RateLimit::default()));

        bucket.try_acquire()
    }

    /// Get the remaining tokens for a provider.
    pub fn remaining_tokens(&self, provider: &str) -> f64 {
        let mut buckets = self.lock_buckets();

        if let Some(bucket) = buckets.get_mut(provider) {
            bucket.refill();
            bucket.tokens
        } else {
            f64::from(RateLimit::default().burst)
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_delay_limit(rpm: u32, burst: u32) -> RateLimit {
        RateLimit {
            requests_per_minute: rpm,
            burst,
            min_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_token_bucket_burst_then_empty() {
        let mut bucket = TokenBucket::from_limit(&no_delay_limit(60, 3));

        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_token_bucket_refill() {
        let mut bucket = TokenBucket::from_limit(&no_delay_limit(60, 1));

        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());

        // Simulate elapsed time
        bucket.last_update = Instant::now() - Duration::from_secs(2);

        assert!(bucket.try_acquire());
    }

    #[test]
    fn test_min_delay_blocks_back_to_back() {
        let mut bucket = TokenBucket::from_limit(&RateLimit {
            requests_per_minute: 6000,
            burst: 10,
            min_delay: Duration::from_secs(5),
        });

        assert!(bucket.try_acquire());
        // Tokens remain but spacing forbids an immediate second request
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_per_provider_isolation() {
        let limiter = RateLimiter::new();
        limiter.register("PROVIDER_A", &no_delay_limit(60, 1));
        limiter.register("PROVIDER_B", &no_delay_limit(60, 1));

        assert!(limiter.try_acquire("PROVIDER_A"));
        assert!(!limiter.try_acquire("PROVIDER_A"));

        assert!(limiter.try_acquire("PROVIDER_B"));
    }

    #[test]
    fn test_register_replaces_bucket() {
        let limiter = RateLimiter::new();
        limiter.register("PROVIDER", &no_delay_limit(60, 1));
        assert!(limiter.try_acquire("PROVIDER"));
        assert!(!limiter.try_acquire("PROVIDER"));

        limiter.register("PROVIDER", &no_delay_limit(60, 2));
        assert!(limiter.try_acquire("PROVIDER"));
    }

    #[tokio::test]
    async fn test_async_acquire_waits() {
        let limiter = RateLimiter::new();
        limiter.register("ASYNC_PROVIDER", &no_delay_limit(6000, 2));

        limiter.acquire("ASYNC_PROVIDER").await;
        limiter.acquire("ASYNC_PROVIDER").await;

        let start = Instant::now();
        limiter.acquire("ASYNC_PROVIDER").await;

        // 100 tokens/second, so roughly a 10ms wait
        assert!(start.elapsed().as_millis() >= 5);
    }
}
