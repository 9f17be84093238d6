//! Rate limiting middleware.
//!
//! Token bucket per client IP. Buckets are created on first sight and live
//! for the lifetime of the process.

use crate::api::ApiError;
use crate::middleware::chain::{Next, Stage};
use crate::middleware::client_ip;
use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Time source for refill calculations.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Configuration for rate limiting.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Tokens added back per second.
    pub refill_per_sec: f64,
    /// Bucket capacity; also the size of an initial burst.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            refill_per_sec: 1.0,
            burst: 5,
        }
    }
}

/// Bucket state in nanoseconds of refill credit; one token costs
/// `token_cost_ns`, so refill stays exact for any rate.
struct TokenBucket {
    credit_ns: u128,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity_ns: u128, now: Instant) -> Self {
        Self {
            credit_ns: capacity_ns,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, now: Instant, capacity_ns: u128, token_cost_ns: u128) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_nanos();
        self.credit_ns = self.credit_ns.saturating_add(elapsed).min(capacity_ns);
        self.last_refill = now;

        if self.credit_ns >= token_cost_ns {
            self.credit_ns -= token_cost_ns;
            true
        } else {
            false
        }
    }
}

/// Nanoseconds needed to refill one token. A non-positive rate never refills.
fn token_cost_ns(refill_per_sec: f64) -> u128 {
    if refill_per_sec > 0.0 {
        (1e9 / refill_per_sec).floor().max(1.0) as u128
    } else {
        u128::from(u64::MAX)
    }
}

/// Per-key token buckets behind a read-mostly map.
pub struct IpRateLimiter {
    token_cost_ns: u128,
    capacity_ns: u128,
    buckets: RwLock<HashMap<String, Arc<Mutex<TokenBucket>>>>,
    clock: Arc<dyn Clock>,
}

impl IpRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let token_cost_ns = token_cost_ns(config.refill_per_sec);
        Self {
            token_cost_ns,
            capacity_ns: token_cost_ns * u128::from(config.burst),
            buckets: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Take one token for `key` if available.
    pub fn allow(&self, key: &str) -> bool {
        let bucket = self.bucket(key);
        let mut bucket = bucket.lock();
        let now = self.clock.now();
        bucket.try_acquire(now, self.capacity_ns, self.token_cost_ns)
    }

    /// Number of distinct keys seen so far.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.read().len()
    }

    fn bucket(&self, key: &str) -> Arc<Mutex<TokenBucket>> {
        if let Some(bucket) = self.buckets.read().get(key) {
            return Arc::clone(bucket);
        }

        // Another worker may have inserted between the two locks
        let mut buckets = self.buckets.write();
        let capacity_ns = self.capacity_ns;
        let now = self.clock.now();
        Arc::clone(
            buckets
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::full(capacity_ns, now)))),
        )
    }

    /// Whole seconds until the next token, for Retry-After.
    fn retry_after_secs(&self) -> u64 {
        let secs = self.token_cost_ns.div_ceil(1_000_000_000);
        u64::try_from(secs).unwrap_or(u64::MAX).max(1)
    }
}

/// Rejects requests once a client's bucket is empty.
pub struct RateLimitStage {
    limiter: Arc<IpRateLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<IpRateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn process(&self, req: Request, next: Next<'_>) -> Response {
        let key = client_ip(&req)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if self.limiter.allow(&key) {
            return next.run(req).await;
        }

        let retry_after = self.limiter.retry_after_secs();
        warn!(
            component = "middleware::rate_limit",
            client_ip = %key,
            retry_after_secs = retry_after,
            "Rate limit exceeded"
        );

        let mut response = ApiError::RateLimited.into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    /// Controllable clock; clones share the same instant.
    #[derive(Clone)]
    struct ManualClock {
        now: Arc<Mutex<Instant>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Arc::new(Mutex::new(Instant::now())),
            }
        }

        fn advance(&self, by: Duration) {
            *self.now.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock()
        }
    }

    fn manual_limiter(refill_per_sec: f64, burst: u32) -> (IpRateLimiter, ManualClock) {
        let clock = ManualClock::new();
        let limiter = IpRateLimiter::with_clock(
            RateLimitConfig {
                refill_per_sec,
                burst,
            },
            Arc::new(clock.clone()),
        );
        (limiter, clock)
    }

    #[test]
    fn test_burst_then_deny() {
        let (limiter, _clock) = manual_limiter(1.0, 5);

        for i in 0..5 {
            assert!(limiter.allow("10.0.0.1"), "request {} should pass", i + 1);
        }
        assert!(!limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn test_refill_adds_exactly_one_token_per_interval() {
        let (limiter, clock) = manual_limiter(1.0, 5);
        for _ in 0..5 {
            limiter.allow("10.0.0.1");
        }
        assert!(!limiter.allow("10.0.0.1"));

        clock.advance(Duration::from_secs(1));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));

        let (fast, fast_clock) = manual_limiter(2.0, 5);
        for _ in 0..5 {
            fast.allow("k");
        }
        fast_clock.advance(Duration::from_millis(500));
        assert!(fast.allow("k"));
        assert!(!fast.allow("k"));
    }

    #[test]
    fn test_refill_is_exact_for_fractional_intervals() {
        let (limiter, clock) = manual_limiter(3.0, 1);
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));

        for _ in 0..3 {
            clock.advance(Duration::from_secs_f64(1.0 / 3.0));
            assert!(limiter.allow("10.0.0.1"));
            assert!(!limiter.allow("10.0.0.1"));
        }

        let (limiter, clock) = manual_limiter(7.0, 2);
        limiter.allow("k");
        limiter.allow("k");
        clock.advance(Duration::from_secs_f64(1.0 / 7.0));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));
    }

    #[test]
    fn test_refill_caps_at_burst() {
        let (limiter, clock) = manual_limiter(1.0, 5);
        limiter.allow("10.0.0.1");

        clock.advance(Duration::from_secs(60));
        for _ in 0..5 {
            assert!(limiter.allow("10.0.0.1"));
        }
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = manual_limiter(1.0, 2);

        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));

        assert!(limiter.allow("10.0.0.2"));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_concurrent_same_key_never_over_admits() {
        let (limiter, _clock) = manual_limiter(1.0, 50);
        let limiter = Arc::new(limiter);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..20).filter(|_| limiter.allow("10.0.0.9")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let (slow, _) = manual_limiter(0.3, 1);
        assert_eq!(slow.retry_after_secs(), 4);

        let (fast, _) = manual_limiter(10.0, 1);
        assert_eq!(fast.retry_after_secs(), 1);
    }
}
