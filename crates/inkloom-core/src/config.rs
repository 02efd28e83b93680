//! Pipeline configuration
//!
//! Sources, lowest priority first:
//! 1. Embedded defaults (`config/default.toml`)
//! 2. The file given on the command line, else `./inkloom.toml`, else
//!    `<config dir>/inkloom/config.toml`
//! 3. `INKLOOM_*` environment variables (`__` separates nested keys)
//!
//! API keys written as `$NAME` are read from the environment after loading.

use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use config::{Config, Environment, File, FileFormat};
use inkloom_llm::{
    BackendConfig, BalancedWeights, CircuitBreakerConfig, DispatcherConfig, SelectionStrategy,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Environment variable prefix
pub const ENV_PREFIX: &str = "INKLOOM";

fn default_failure_threshold() -> u32 {
    5
}

fn default_base_cooldown_secs() -> u64 {
    60
}

fn default_max_cooldown_secs() -> u64 {
    900
}

/// Circuit breaker settings as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Cooldown after the first trip, in seconds
    #[serde(default = "default_base_cooldown_secs")]
    pub base_cooldown_secs: u64,
    /// Cooldown ceiling, in seconds
    #[serde(default = "default_max_cooldown_secs")]
    pub max_cooldown_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            base_cooldown_secs: default_base_cooldown_secs(),
            max_cooldown_secs: default_max_cooldown_secs(),
        }
    }
}

impl CircuitBreakerSettings {
    /// Convert to the breaker's runtime configuration
    #[must_use]
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.failure_threshold)
            .with_base_cooldown(Duration::from_secs(self.base_cooldown_secs))
            .with_max_cooldown(Duration::from_secs(self.max_cooldown_secs))
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ranking objective when a request names none
    #[serde(default)]
    pub default_strategy: SelectionStrategy,
    /// Balanced objective weights
    #[serde(default)]
    pub weights: BalancedWeights,
    /// Configured backends, in preference order for equal priority
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Dispatcher backoff and cache
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Circuit breaker thresholds
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    /// Execution engine limits
    #[serde(default)]
    pub engine: EngineConfig,
}

impl PipelineConfig {
    /// Load configuration from defaults, a file and the environment
    ///
    /// An explicit `path` must exist; the fallback locations are optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => {
                if let Some(user) = Self::user_config_path() {
                    builder = builder.add_source(File::from(user).required(false));
                }
                builder.add_source(File::with_name("inkloom").required(false))
            }
        };

        let config = builder
            // prefix_separator("_") keeps INKLOOM_ENGINE__TIMEOUT_SECS working
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build configuration: {e}")))?;

        let mut loaded: Self = config.try_deserialize().map_err(|e| {
            Error::Configuration(format!("failed to deserialize configuration: {e}"))
        })?;
        loaded.resolve_api_keys();
        loaded.validate()?;
        debug!(backends = loaded.backends.len(), "Loaded pipeline configuration");
        Ok(loaded)
    }

    /// Parse a TOML document on top of the embedded defaults
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to parse configuration: {e}")))?;

        let mut parsed: Self = config.try_deserialize().map_err(|e| {
            Error::Configuration(format!("failed to deserialize configuration: {e}"))
        })?;
        parsed.resolve_api_keys();
        parsed.validate()?;
        Ok(parsed)
    }

    /// `<config dir>/inkloom/config.toml`, when a config directory exists
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("inkloom").join("config.toml"))
    }

    /// Replace `$NAME` API keys with the environment value
    ///
    /// Unset variables leave the backend without a key.
    pub fn resolve_api_keys(&mut self) {
        for backend in &mut self.backends {
            let Some(var) = backend.api_key.as_deref().and_then(|k| k.strip_prefix('$')) else {
                continue;
            };
            match std::env::var(var) {
                Ok(value) if !value.is_empty() => backend.api_key = Some(value),
                _ => {
                    warn!(backend = %backend.name, var = %var, "API key variable not set");
                    backend.api_key = None;
                }
            }
        }
    }

    /// Check every value the runtime relies on
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for backend in &self.backends {
            backend.validate().map_err(|e| Error::InvalidConfig {
                field: "backends".to_string(),
                message: e.to_string(),
            })?;
            if !names.insert(backend.name.as_str()) {
                return Err(Error::InvalidConfig {
                    field: "backends".to_string(),
                    message: format!("duplicate backend name '{}'", backend.name),
                });
            }
        }

        let weights = [self.weights.cost, self.weights.latency, self.weights.quality];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0
        {
            return Err(Error::InvalidConfig {
                field: "weights".to_string(),
                message: "weights must be non-negative and not all zero".to_string(),
            });
        }

        if self.dispatcher.backoff_multiplier < 1.0 {
            return Err(Error::InvalidConfig {
                field: "dispatcher.backoff_multiplier".to_string(),
                message: "must be at least 1.0".to_string(),
            });
        }
        if self.dispatcher.base_backoff_ms > self.dispatcher.max_backoff_ms {
            return Err(Error::InvalidConfig {
                field: "dispatcher.base_backoff_ms".to_string(),
                message: "must not exceed max_backoff_ms".to_string(),
            });
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(Error::InvalidConfig {
                field: "circuit_breaker.failure_threshold".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.circuit_breaker.base_cooldown_secs > self.circuit_breaker.max_cooldown_secs {
            return Err(Error::InvalidConfig {
                field: "circuit_breaker.base_cooldown_secs".to_string(),
                message: "must not exceed max_cooldown_secs".to_string(),
            });
        }

        if self.engine.max_dispatches_per_role == 0 {
            return Err(Error::InvalidConfig {
                field: "engine.max_dispatches_per_role".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Write the configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Configuration(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("failed to serialize configuration: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| Error::Configuration(format!("failed to write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkloom_llm::Provider;

    const SAMPLE: &str = r#"
default_strategy = "minimize_cost"

[[backends]]
name = "deepseek-main"
provider = "deepseek"
cost_per_1k_tokens = 0.0014

[[backends]]
name = "claude"
provider = "anthropic"
priority = 2
api_key = "$INKLOOM_TEST_UNSET_KEY"
"#;

    #[test]
    fn test_embedded_defaults_parse() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.default_strategy, SelectionStrategy::Balanced);
        assert_eq!(config.engine.max_dispatches_per_role, 3);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.dispatcher.base_backoff_ms, 500);
        assert!(config.backends.is_empty());
    }

    #[test]
    fn test_backends_parsed_with_defaults() {
        let config = PipelineConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.default_strategy, SelectionStrategy::MinimizeCost);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].provider, Provider::DeepSeek);
        assert_eq!(config.backends[0].rate_limit_per_minute, 60);
        assert_eq!(config.backends[1].priority, 2);
    }

    #[test]
    fn test_unset_key_variable_clears_key() {
        let config = PipelineConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.backends[1].api_key, None);
    }

    #[test]
    fn test_duplicate_backend_rejected() {
        let toml = r#"
[[backends]]
name = "a"
provider = "openai"

[[backends]]
name = "a"
provider = "deepseek"
"#;
        let err = PipelineConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { ref field, .. } if field == "backends"));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = PipelineConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("inkloom.toml");

        let config = PipelineConfig::from_toml_str(SAMPLE).unwrap();
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.backends.len(), 2);
        assert_eq!(loaded.default_strategy, SelectionStrategy::MinimizeCost);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(PipelineConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_breaker_settings_convert() {
        let breaker = CircuitBreakerSettings::default().to_breaker_config();
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.cooldown_for(1), Duration::from_secs(60));
    }
}
