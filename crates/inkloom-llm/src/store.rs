//! Backend descriptor store
//!
//! [`BackendStore`] is the injected interface the selector, dispatcher and
//! coordinator read through. [`BackendRegistry`] is the in-process
//! implementation: one entry per backend, each behind its own locks, so
//! outcomes recorded for one backend never contend with another.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::config::BackendConfig;
use crate::descriptor::{BackendDescriptor, BackendStats, CallOutcome, StatsCounters};
use crate::error::{Error, Result};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared backend state
#[cfg_attr(test, mockall::automock)]
pub trait BackendStore: Send + Sync {
    /// Enabled backends with a closed (or probing) circuit and rate-limit
    /// capacity, ordered by priority ascending
    fn list_usable(&self) -> Vec<BackendDescriptor>;

    /// Every configured backend, same ordering
    fn list_all(&self) -> Vec<BackendDescriptor>;

    /// Look up one backend
    fn get(&self, name: &str) -> Option<BackendDescriptor>;

    /// Whether the backend is enabled and its circuit admits a call
    fn is_available(&self, name: &str) -> bool;

    /// Take a rate-limit token without waiting
    fn try_acquire(&self, name: &str) -> bool;

    /// Keep a backend out of rotation for a provider-requested pause
    fn throttle(&self, name: &str, retry_after: Duration);

    /// Record the result of one call attempt
    fn record_outcome(&self, name: &str, outcome: &CallOutcome);

    /// Statistics snapshot for every backend
    fn stats(&self) -> Vec<BackendStats>;

    /// Enable or disable a backend
    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()>;

    /// Apply a new set of backend entries
    fn apply_config(&self, configs: &[BackendConfig]) -> Result<ReloadSummary>;
}

/// What a configuration reload changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    /// Backends created by this reload
    pub added: Vec<String>,
    /// Existing backends whose settings were replaced
    pub updated: Vec<String>,
    /// Backends missing from the new configuration
    pub disabled: Vec<String>,
    /// Backends whose circuit was reset because the endpoint changed
    pub circuit_reset: Vec<String>,
}

#[derive(Debug)]
struct BackendEntry {
    order: usize,
    config: RwLock<BackendConfig>,
    breaker: CircuitBreaker,
    stats: Mutex<StatsCounters>,
}

impl BackendEntry {
    fn config(&self) -> BackendConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn enabled(&self) -> bool {
        self.config.read().unwrap_or_else(|e| e.into_inner()).enabled
    }

    fn descriptor(&self) -> BackendDescriptor {
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        BackendDescriptor {
            config: self.config(),
            avg_response_time_ms: stats.avg_response_time_ms,
            consecutive_errors: self.breaker.consecutive_failures(),
            circuit_open_until: self.breaker.open_until(),
        }
    }

    fn snapshot(&self) -> BackendStats {
        let config = self.config();
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        BackendStats {
            name: config.name,
            provider: config.provider,
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            success_rate: stats.success_rate(),
            avg_response_time_ms: stats.avg_response_time_ms,
            total_tokens: stats.total_tokens,
            total_cost: stats.total_cost,
            consecutive_errors: self.breaker.consecutive_failures(),
            enabled: config.enabled,
            circuit_state: self.breaker.state(),
            rate_limit_hits: stats.rate_limit_hits,
            last_failure: stats.last_failure,
            last_used: stats.last_used,
        }
    }
}

/// In-process [`BackendStore`]
#[derive(Debug)]
pub struct BackendRegistry {
    entries: DashMap<String, Arc<BackendEntry>>,
    limiter: RateLimiter,
    breaker_config: CircuitBreakerConfig,
    next_order: AtomicUsize,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl BackendRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new(breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            entries: DashMap::new(),
            limiter: RateLimiter::new(),
            breaker_config,
            next_order: AtomicUsize::new(0),
        }
    }

    /// Create a registry populated from configuration
    pub fn from_configs(
        configs: &[BackendConfig],
        breaker_config: CircuitBreakerConfig,
    ) -> Result<Self> {
        let registry = Self::new(breaker_config);
        for config in configs {
            registry.register(config.clone())?;
        }
        Ok(registry)
    }

    /// Add a backend; fails if the name is already taken
    pub fn register(&self, config: BackendConfig) -> Result<()> {
        config.validate()?;
        if self.entries.contains_key(&config.name) {
            return Err(Error::Config(format!(
                "duplicate backend name '{}'",
                config.name
            )));
        }
        self.insert(config);
        Ok(())
    }

    fn insert(&self, config: BackendConfig) {
        let name = config.name.clone();
        self.limiter
            .configure(&name, RateLimitConfig::per_minute(config.rate_limit_per_minute));
        let entry = BackendEntry {
            order: self.next_order.fetch_add(1, Ordering::Relaxed),
            breaker: CircuitBreaker::new(name.clone(), self.breaker_config.clone()),
            config: RwLock::new(config),
            stats: Mutex::new(StatsCounters::default()),
        };
        debug!(backend = %name, "Registered backend");
        self.entries.insert(name, Arc::new(entry));
    }

    /// Number of configured backends
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no backend is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Circuit breaker of one backend
    #[must_use]
    pub fn breaker_state(&self, name: &str) -> Option<CircuitState> {
        self.entries.get(name).map(|e| e.breaker.state())
    }

    fn sorted_entries(&self) -> Vec<Arc<BackendEntry>> {
        let mut entries: Vec<Arc<BackendEntry>> =
            self.entries.iter().map(|e| Arc::clone(e.value())).collect();
        entries.sort_by_key(|e| {
            let priority = e.config.read().unwrap_or_else(|p| p.into_inner()).priority;
            (priority, e.order)
        });
        entries
    }
}

impl BackendStore for BackendRegistry {
    fn list_usable(&self) -> Vec<BackendDescriptor> {
        self.sorted_entries()
            .into_iter()
            .filter(|e| e.enabled() && e.breaker.can_execute())
            .map(|e| e.descriptor())
            .filter(|d| self.limiter.has_capacity(d.name()))
            .collect()
    }

    fn list_all(&self) -> Vec<BackendDescriptor> {
        self.sorted_entries()
            .into_iter()
            .map(|e| e.descriptor())
            .collect()
    }

    fn get(&self, name: &str) -> Option<BackendDescriptor> {
        self.entries.get(name).map(|e| e.descriptor())
    }

    fn is_available(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(|e| e.enabled() && e.breaker.can_execute())
    }

    fn try_acquire(&self, name: &str) -> bool {
        let result = self.limiter.acquire(name);
        if !result.allowed {
            debug!(
                backend = %name,
                reset_after_ms = result.reset_after.as_millis() as u64,
                "Local rate limit reached"
            );
        }
        result.allowed
    }

    fn throttle(&self, name: &str, retry_after: Duration) {
        info!(
            backend = %name,
            retry_after_secs = retry_after.as_secs(),
            "Provider asked to retry later"
        );
        self.limiter.throttle(name, retry_after);
    }

    fn record_outcome(&self, name: &str, outcome: &CallOutcome) {
        let Some(entry) = self.entries.get(name).map(|e| Arc::clone(e.value())) else {
            warn!(backend = %name, "Outcome recorded for unknown backend");
            return;
        };

        // Stats and breaker move together for one backend.
        let mut stats = entry.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.apply(outcome);
        match outcome.failure {
            None => entry.breaker.record_success(),
            Some(kind) if kind.is_permanent() => {
                warn!(backend = %name, reason = %kind, "Permanent backend failure");
                entry.breaker.force_open();
            }
            Some(kind) if kind.counts_as_failure() => {
                entry.breaker.record_failure();
            }
            Some(_) => {}
        }
    }

    fn stats(&self) -> Vec<BackendStats> {
        self.sorted_entries()
            .into_iter()
            .map(|e| e.snapshot())
            .collect()
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::NotConfigured(name.to_string()))?;
        entry.config.write().unwrap_or_else(|e| e.into_inner()).enabled = enabled;
        info!(backend = %name, enabled, "Backend availability changed");
        Ok(())
    }

    fn apply_config(&self, configs: &[BackendConfig]) -> Result<ReloadSummary> {
        for config in configs {
            config.validate()?;
        }
        let mut seen = std::collections::HashSet::new();
        for config in configs {
            if !seen.insert(config.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate backend name '{}'",
                    config.name
                )));
            }
        }

        let mut summary = ReloadSummary::default();
        for config in configs {
            let existing = self.entries.get(&config.name).map(|e| Arc::clone(e.value()));
            match existing {
                Some(entry) => {
                    let endpoint_changed = {
                        let mut current = entry.config.write().unwrap_or_else(|e| e.into_inner());
                        let changed = current.endpoint_changed(config);
                        *current = config.clone();
                        changed
                    };
                    self.limiter.configure(
                        &config.name,
                        RateLimitConfig::per_minute(config.rate_limit_per_minute),
                    );
                    if endpoint_changed {
                        entry.breaker.reset();
                        summary.circuit_reset.push(config.name.clone());
                    }
                    summary.updated.push(config.name.clone());
                }
                None => {
                    self.insert(config.clone());
                    summary.added.push(config.name.clone());
                }
            }
        }

        for entry in self.sorted_entries() {
            let mut current = entry.config.write().unwrap_or_else(|e| e.into_inner());
            if !seen.contains(current.name.as_str()) && current.enabled {
                current.enabled = false;
                summary.disabled.push(current.name.clone());
            }
        }

        info!(
            added = summary.added.len(),
            updated = summary.updated.len(),
            disabled = summary.disabled.len(),
            "Backend configuration applied"
        );
        Ok(summary)
    }
}
