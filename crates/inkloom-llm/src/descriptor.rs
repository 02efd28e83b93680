//! Backend descriptors, call outcomes and statistics
//!
//! A [`BackendDescriptor`] is a point-in-time view of one backend: its
//! configuration plus the live health fields the selector scores on.
//! Descriptors are cheap clones handed out by the store; mutating live state
//! goes through [`crate::store::BackendStore::record_outcome`].

use crate::circuit_breaker::CircuitState;
use crate::config::BackendConfig;
use crate::error::FailureKind;
use crate::provider::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Smoothing factor for the latency moving average
pub const LATENCY_EMA_ALPHA: f64 = 0.3;

/// Snapshot of one configured backend
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    /// Configuration the backend was built from
    pub config: BackendConfig,
    /// Exponential moving average of successful call latency (0 = no samples)
    pub avg_response_time_ms: f64,
    /// Current failure streak
    pub consecutive_errors: u32,
    /// Set while the circuit is tripped
    pub circuit_open_until: Option<Instant>,
}

impl BackendDescriptor {
    /// Unique backend name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Provider kind
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.config.provider
    }

    /// Lower is preferred
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.config.priority
    }

    /// Cost per 1K tokens
    #[must_use]
    pub fn cost_per_1k_tokens(&self) -> f64 {
        self.config.cost_per_1k_tokens
    }

    /// Quality weight in `[0, 1]`
    #[must_use]
    pub fn quality_weight(&self) -> f64 {
        self.config.effective_quality_weight()
    }

    /// Whether the backend takes traffic
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Per-request timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    /// Cost of a call that used `tokens`
    #[must_use]
    pub fn cost_for(&self, tokens: u64) -> f64 {
        tokens as f64 / 1000.0 * self.config.cost_per_1k_tokens
    }
}

/// Result of one call attempt, as recorded into the store
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    /// `None` on success
    pub failure: Option<FailureKind>,
    /// Wall-clock latency of the attempt
    pub latency_ms: u64,
    /// Tokens consumed (0 for failures)
    pub tokens_used: u64,
    /// Cost in USD (0 for failures)
    pub cost: f64,
}

impl CallOutcome {
    /// A successful call
    #[must_use]
    pub fn success(latency_ms: u64, tokens_used: u64, cost: f64) -> Self {
        Self {
            failure: None,
            latency_ms,
            tokens_used,
            cost,
        }
    }

    /// A failed call
    #[must_use]
    pub fn failure(kind: FailureKind, latency_ms: u64) -> Self {
        Self {
            failure: Some(kind),
            latency_ms,
            tokens_used: 0,
            cost: 0.0,
        }
    }

    /// Whether the call succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Serializable statistics for one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStats {
    /// Backend name
    pub name: String,
    /// Provider kind
    pub provider: Provider,
    /// Calls that reached the provider and completed or failed
    pub total_requests: u64,
    /// Successful calls
    pub successful_requests: u64,
    /// Failed calls (rate limits excluded)
    pub failed_requests: u64,
    /// Success rate in percent (100 when no calls were made)
    pub success_rate: f64,
    /// Latency moving average in milliseconds
    pub avg_response_time_ms: f64,
    /// Tokens consumed
    pub total_tokens: u64,
    /// Accumulated cost in USD
    pub total_cost: f64,
    /// Current failure streak
    pub consecutive_errors: u32,
    /// Whether the backend takes traffic
    pub enabled: bool,
    /// Circuit state at snapshot time
    pub circuit_state: CircuitState,
    /// Local throttle denials plus provider 429s
    pub rate_limit_hits: u64,
    /// Reason code of the most recent failure
    pub last_failure: Option<FailureKind>,
    /// Last time the backend was called
    pub last_used: Option<DateTime<Utc>>,
}

/// Mutable per-backend counters
#[derive(Debug, Clone, Default)]
pub(crate) struct StatsCounters {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub avg_response_time_ms: f64,
    pub latency_samples: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub rate_limit_hits: u64,
    pub last_failure: Option<FailureKind>,
    pub last_used: Option<DateTime<Utc>>,
}

impl StatsCounters {
    /// Fold one outcome into the counters
    pub fn apply(&mut self, outcome: &CallOutcome) {
        self.last_used = Some(Utc::now());
        match outcome.failure {
            None => {
                self.total_requests += 1;
                self.successful_requests += 1;
                self.total_tokens += outcome.tokens_used;
                self.total_cost += outcome.cost;
                self.observe_latency(outcome.latency_ms);
            }
            Some(FailureKind::RateLimited) => {
                self.rate_limit_hits += 1;
                self.last_failure = Some(FailureKind::RateLimited);
            }
            Some(kind) => {
                self.total_requests += 1;
                self.failed_requests += 1;
                self.last_failure = Some(kind);
            }
        }
    }

    fn observe_latency(&mut self, latency_ms: u64) {
        let sample = latency_ms as f64;
        self.avg_response_time_ms = if self.latency_samples == 0 {
            sample
        } else {
            LATENCY_EMA_ALPHA * sample + (1.0 - LATENCY_EMA_ALPHA) * self.avg_response_time_ms
        };
        self.latency_samples += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            100.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64 * 100.0
        }
    }
}
