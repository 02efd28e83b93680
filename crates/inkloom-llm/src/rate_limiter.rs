//! Per-backend request throttling
//!
//! Token bucket per backend, refilled continuously. Acquisition never waits:
//! a caller that cannot take a token moves on to the next candidate instead
//! of blocking unrelated requests behind a busy backend.
//!
//! A provider's `Retry-After` hint blocks the bucket until the given instant,
//! even when the bucket itself is unlimited.

use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Rate limiter configuration for one backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Bucket capacity (0 = unlimited)
    pub capacity: u32,
    /// Time to refill a full bucket from empty
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

impl RateLimitConfig {
    /// Create a new rate limit config
    #[must_use]
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self { capacity, window }
    }

    /// Create config for requests per minute
    #[must_use]
    pub fn per_minute(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(60))
    }

    /// Whether this config imposes no limit
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.capacity == 0 || self.window.is_zero()
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Whole tokens left after this request
    pub remaining: u32,
    /// Time until the next token is available
    pub reset_after: Duration,
}

impl RateLimitResult {
    fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_after: Duration::ZERO,
        }
    }

    fn denied(reset_after: Duration) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_after,
        }
    }

    fn unlimited() -> Self {
        Self::allowed(u32::MAX)
    }
}

#[derive(Debug)]
struct TokenBucket {
    config: RateLimitConfig,
    tokens: f64,
    last_refill: Instant,
    blocked_until: Option<Instant>,
}

impl TokenBucket {
    fn new(config: RateLimitConfig, now: Instant) -> Self {
        Self {
            config,
            tokens: f64::from(config.capacity),
            last_refill: now,
            blocked_until: None,
        }
    }

    fn refill_per_sec(&self) -> f64 {
        f64::from(self.config.capacity) / self.config.window.as_secs_f64()
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens =
                (self.tokens + elapsed * self.refill_per_sec()).min(f64::from(self.config.capacity));
            self.last_refill = now;
        }
    }

    fn time_to_next_token(&self) -> Duration {
        let missing = (1.0 - self.tokens).max(0.0);
        Duration::from_secs_f64(missing / self.refill_per_sec())
    }

    fn blocked_for(&mut self, now: Instant) -> Option<Duration> {
        match self.blocked_until {
            Some(until) if until > now => Some(until - now),
            Some(_) => {
                self.blocked_until = None;
                None
            }
            None => None,
        }
    }

    fn try_take(&mut self, now: Instant) -> RateLimitResult {
        if let Some(wait) = self.blocked_for(now) {
            return RateLimitResult::denied(wait);
        }
        if self.config.is_unlimited() {
            return RateLimitResult::unlimited();
        }
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            RateLimitResult::allowed(self.tokens.floor() as u32)
        } else {
            RateLimitResult::denied(self.time_to_next_token())
        }
    }

    fn peek(&mut self, now: Instant) -> bool {
        if self.blocked_for(now).is_some() {
            return false;
        }
        if self.config.is_unlimited() {
            return true;
        }
        self.refill(now);
        self.tokens >= 1.0
    }

    fn reconfigure(&mut self, config: RateLimitConfig, now: Instant) {
        if self.config.is_unlimited() {
            let blocked_until = self.blocked_until;
            *self = Self::new(config, now);
            self.blocked_until = blocked_until;
            return;
        }
        self.refill(now);
        self.config = config;
        self.tokens = self.tokens.min(f64::from(config.capacity));
    }
}

/// Token-bucket rate limiter keyed by backend name
///
/// Each bucket sits behind its own mutex; there is no global lock.
/// Unknown backends are not throttled.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Mutex<TokenBucket>>,
}

impl RateLimiter {
    /// Create an empty rate limiter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or update the bucket for a backend
    ///
    /// Updating keeps the current fill level, clamped to the new capacity.
    pub fn configure(&self, name: &str, config: RateLimitConfig) {
        let now = Instant::now();
        if let Some(bucket) = self.buckets.get(name) {
            let mut bucket = bucket.lock().unwrap_or_else(|e| e.into_inner());
            bucket.reconfigure(config, now);
            return;
        }
        debug!(backend = %name, capacity = config.capacity, "Configuring rate limit bucket");
        self.buckets
            .insert(name.to_string(), Mutex::new(TokenBucket::new(config, now)));
    }

    /// Refuse tokens for a backend until `retry_after` has passed
    ///
    /// A later block never shortens an earlier, longer one.
    pub fn throttle(&self, name: &str, retry_after: Duration) {
        self.throttle_at(name, retry_after, Instant::now());
    }

    pub(crate) fn throttle_at(&self, name: &str, retry_after: Duration, now: Instant) {
        let Some(bucket) = self.buckets.get(name) else {
            return;
        };
        let mut bucket = bucket.lock().unwrap_or_else(|e| e.into_inner());
        let until = now + retry_after;
        if bucket.blocked_until.is_none_or(|current| current < until) {
            bucket.blocked_until = Some(until);
        }
        debug!(
            backend = %name,
            retry_after_ms = retry_after.as_millis() as u64,
            "Backend throttled by provider"
        );
    }

    /// Take a token, returning the full result
    pub fn acquire(&self, name: &str) -> RateLimitResult {
        self.acquire_at(name, Instant::now())
    }

    pub(crate) fn acquire_at(&self, name: &str, now: Instant) -> RateLimitResult {
        match self.buckets.get(name) {
            Some(bucket) => bucket
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .try_take(now),
            None => RateLimitResult::unlimited(),
        }
    }

    /// Take a token if one is available; never waits
    pub fn try_acquire(&self, name: &str) -> bool {
        self.acquire(name).allowed
    }

    /// Whether a token is available, without consuming it
    #[must_use]
    pub fn has_capacity(&self, name: &str) -> bool {
        self.has_capacity_at(name, Instant::now())
    }

    pub(crate) fn has_capacity_at(&self, name: &str, now: Instant) -> bool {
        match self.buckets.get(name) {
            Some(bucket) => bucket.lock().unwrap_or_else(|e| e.into_inner()).peek(now),
            None => true,
        }
    }

    /// Whole tokens currently available (`None` when unlimited or unknown)
    #[must_use]
    pub fn available(&self, name: &str) -> Option<u32> {
        let bucket = self.buckets.get(name)?;
        let mut bucket = bucket.lock().unwrap_or_else(|e| e.into_inner());
        if bucket.config.is_unlimited() {
            return None;
        }
        bucket.refill(Instant::now());
        Some(bucket.tokens.floor() as u32)
    }
}
