//! Dispatcher configuration

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

/// Backoff and caching behavior of the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Delay after the first transient failure
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Ceiling for any single backoff
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Growth factor per attempt
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter (never above the ceiling)
    #[serde(default = "default_true")]
    pub jitter: bool,
    /// Serve repeated prompts from the response cache
    #[serde(default)]
    pub cache_enabled: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_multiplier(),
            jitter: true,
            cache_enabled: false,
        }
    }
}

impl DispatcherConfig {
    /// Create a new dispatcher configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the first backoff
    #[must_use]
    pub fn with_base_backoff(mut self, delay: Duration) -> Self {
        self.base_backoff_ms = delay.as_millis() as u64;
        self
    }

    /// Set the backoff ceiling
    #[must_use]
    pub fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff_ms = delay.as_millis() as u64;
        self
    }

    /// Set the growth factor
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Enable or disable the response cache
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Backoff before the attempt after `attempt_index` (0-based), without jitter
    #[must_use]
    pub fn base_delay(&self, attempt_index: u32) -> Duration {
        let exponent = attempt_index.min(31) as i32;
        let delay_ms = self.base_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay_ms.min(self.max_backoff_ms as f64) as u64)
    }

    /// Backoff including jitter
    #[must_use]
    pub fn calculate_delay(&self, attempt_index: u32) -> Duration {
        let delay_ms = self.base_delay(attempt_index).as_millis() as u64;
        if !self.jitter {
            return Duration::from_millis(delay_ms);
        }
        let jitter_range = delay_ms / 4;
        let jitter = if jitter_range == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_range)
        };
        Duration::from_millis((delay_ms + jitter).min(self.max_backoff_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.base_backoff_ms, 500);
        assert_eq!(config.max_backoff_ms, 8_000);
        assert!(config.jitter);
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_exponential_delay_capped() {
        let config = DispatcherConfig::new()
            .with_base_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_millis(500))
            .with_jitter(false);
        assert_eq!(config.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(config.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(config.calculate_delay(3), Duration::from_millis(500));
        assert_eq!(config.calculate_delay(30), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_bounds() {
        let config = DispatcherConfig::new()
            .with_base_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_millis(1_000));
        for _ in 0..50 {
            let delay = config.calculate_delay(1);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(250));
        }
        assert_eq!(config.calculate_delay(10), Duration::from_millis(1_000));
    }
}
