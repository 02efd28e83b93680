//! Per-backend circuit breaker
//!
//! Stops traffic to a backend after consecutive failures. States:
//! - Closed: requests pass through
//! - Open: failure threshold reached (or a hard error forced it), requests are rejected
//! - HalfOpen: cooldown elapsed, the next call is a probe
//!
//! Each trip doubles the cooldown up to a cap. A success resets the streak
//! and the trip count; a failed probe re-trips immediately because the
//! streak is kept across the cooldown.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Requests are rejected until the cooldown elapses
    Open,
    /// Cooldown elapsed; the next outcome decides
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Configuration for circuit breaker
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Cooldown after the first trip
    pub base_cooldown: Duration,
    /// Upper bound for the doubled cooldown
    pub max_cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            base_cooldown: Duration::from_secs(60),
            max_cooldown: Duration::from_secs(900),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the first-trip cooldown
    #[must_use]
    pub fn with_base_cooldown(mut self, cooldown: Duration) -> Self {
        self.base_cooldown = cooldown;
        self
    }

    /// Set the cooldown cap
    #[must_use]
    pub fn with_max_cooldown(mut self, cooldown: Duration) -> Self {
        self.max_cooldown = cooldown;
        self
    }

    /// Cooldown for the given trip number (1-based)
    #[must_use]
    pub fn cooldown_for(&self, trip: u32) -> Duration {
        let exponent = trip.saturating_sub(1).min(16);
        self.base_cooldown
            .saturating_mul(1u32 << exponent)
            .min(self.max_cooldown)
    }
}

#[derive(Debug, Default)]
struct BreakerInner {
    consecutive_failures: u32,
    trips: u32,
    open_until: Option<Instant>,
}

impl BreakerInner {
    fn state(&self, now: Instant) -> CircuitState {
        match self.open_until {
            None => CircuitState::Closed,
            Some(until) if now < until => CircuitState::Open,
            Some(_) => CircuitState::HalfOpen,
        }
    }
}

/// Circuit breaker for one backend
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Get the circuit breaker name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state_at(Instant::now())
    }

    pub(crate) fn state_at(&self, now: Instant) -> CircuitState {
        self.lock().state(now)
    }

    /// Check if the circuit allows a request
    #[must_use]
    pub fn can_execute(&self) -> bool {
        self.can_execute_at(Instant::now())
    }

    pub(crate) fn can_execute_at(&self, now: Instant) -> bool {
        self.state_at(now) != CircuitState::Open
    }

    /// Current consecutive failure streak
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Number of trips since the last success
    #[must_use]
    pub fn trips(&self) -> u32 {
        self.lock().trips
    }

    /// When the circuit re-admits traffic, if it has been tripped
    #[must_use]
    pub fn open_until(&self) -> Option<Instant> {
        self.lock().open_until
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.open_until.is_some() {
            info!(name = %self.name, "Circuit breaker closed");
        }
        *inner = BreakerInner::default();
    }

    /// Record a failed call; returns true if this failure tripped the circuit
    pub fn record_failure(&self) -> bool {
        self.record_failure_at(Instant::now())
    }

    pub(crate) fn record_failure_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        if inner.state(now) == CircuitState::Open {
            return false;
        }

        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        debug!(
            name = %self.name,
            failures = inner.consecutive_failures,
            threshold = self.config.failure_threshold,
            "Circuit breaker failure recorded"
        );

        if inner.consecutive_failures >= self.config.failure_threshold {
            inner.trips = inner.trips.saturating_add(1);
            let cooldown = self.config.cooldown_for(inner.trips);
            inner.open_until = Some(now + cooldown);
            warn!(
                name = %self.name,
                failures = inner.consecutive_failures,
                trips = inner.trips,
                cooldown_secs = cooldown.as_secs(),
                "Circuit breaker opened"
            );
            return true;
        }
        false
    }

    /// Open the circuit for the maximum cooldown regardless of the streak
    pub fn force_open(&self) {
        self.force_open_at(Instant::now());
    }

    pub(crate) fn force_open_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.max(self.config.failure_threshold);
        inner.trips = inner.trips.saturating_add(1);
        inner.open_until = Some(now + self.config.max_cooldown);
        warn!(
            name = %self.name,
            cooldown_secs = self.config.max_cooldown.as_secs(),
            "Circuit breaker forced open"
        );
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.open_until.is_some() || inner.consecutive_failures > 0 {
            info!(name = %self.name, "Circuit breaker reset");
        }
        *inner = BreakerInner::default();
    }
}

#[cfg(test)]
mod tests;
