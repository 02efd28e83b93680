//! Backend configuration types
//!
//! One [`BackendConfig`] per configured endpoint. These are deserialized from
//! the `[[backends]]` table of the pipeline configuration.

use crate::provider::Provider;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    1
}

fn default_rate_limit() -> u32 {
    60
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_model() -> String {
    "default".to_string()
}

/// Configuration for one backend
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Unique backend name
    pub name: String,
    /// Provider kind
    pub provider: Provider,
    /// API key (or value resolved from the environment)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model identifier sent to the provider
    #[serde(default = "default_model")]
    pub model: String,
    /// Lower is preferred
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Token bucket capacity per minute (0 = unlimited)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    /// Cost per 1K tokens in USD
    #[serde(default)]
    pub cost_per_1k_tokens: f64,
    /// Whether the backend takes traffic
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Capability tags a request can require (e.g. "long_context")
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Quality weight in `[0, 1]`; the provider default when unset
    #[serde(default)]
    pub quality_weight: Option<f64>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_deref().map(mask_api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("priority", &self.priority)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("cost_per_1k_tokens", &self.cost_per_1k_tokens)
            .field("enabled", &self.enabled)
            .field("capabilities", &self.capabilities)
            .field("timeout_ms", &self.timeout_ms)
            .field("quality_weight", &self.quality_weight)
            .finish()
    }
}

impl BackendConfig {
    /// Create a config with defaults for everything but name and provider
    #[must_use]
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        Self {
            name: name.into(),
            provider,
            api_key: None,
            base_url: None,
            model: default_model(),
            priority: default_priority(),
            rate_limit_per_minute: default_rate_limit(),
            cost_per_1k_tokens: 0.0,
            enabled: true,
            capabilities: Vec::new(),
            timeout_ms: default_timeout_ms(),
            quality_weight: None,
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set priority (lower is preferred)
    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the per-minute rate limit
    #[must_use]
    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    /// Set cost per 1K tokens
    #[must_use]
    pub fn with_cost(mut self, cost_per_1k_tokens: f64) -> Self {
        self.cost_per_1k_tokens = cost_per_1k_tokens;
        self
    }

    /// Enable or disable the backend
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Add a capability tag
    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Set the quality weight
    #[must_use]
    pub fn with_quality_weight(mut self, weight: f64) -> Self {
        self.quality_weight = Some(weight);
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Quality weight to score with
    #[must_use]
    pub fn effective_quality_weight(&self) -> f64 {
        self.quality_weight
            .unwrap_or_else(|| self.provider.default_quality_weight())
    }

    /// Whether this backend advertises a capability tag
    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Base URL to use: explicit override, else the provider default
    #[must_use]
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .or_else(|| self.provider.default_base_url())
    }

    /// Whether a reload changed how we authenticate or what we call
    #[must_use]
    pub fn endpoint_changed(&self, other: &BackendConfig) -> bool {
        self.provider != other.provider
            || self.api_key != other.api_key
            || self.base_url != other.base_url
            || self.model != other.model
    }

    /// Validate a single entry
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::error::Error::Config(
                "backend name must not be empty".to_string(),
            ));
        }
        if !self.cost_per_1k_tokens.is_finite() || self.cost_per_1k_tokens < 0.0 {
            return Err(crate::error::Error::Config(format!(
                "backend '{}': cost_per_1k_tokens must be a non-negative number",
                self.name
            )));
        }
        if let Some(weight) = self.quality_weight {
            if !(0.0..=1.0).contains(&weight) {
                return Err(crate::error::Error::Config(format!(
                    "backend '{}': quality_weight must be within [0, 1]",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Mask API key for safe display in logs
///
/// Shows the first and last 4 characters for keys longer than 8 characters.
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config: BackendConfig =
            serde_json::from_str(r#"{"name": "primary", "provider": "deepseek"}"#).unwrap();
        assert_eq!(config.priority, 1);
        assert_eq!(config.rate_limit_per_minute, 60);
        assert!(config.enabled);
        assert_eq!(config.model, "default");
        assert_eq!(
            config.effective_base_url(),
            Some("https://api.deepseek.com/v1")
        );
    }

    #[test]
    fn test_debug_masks_key() {
        let config = BackendConfig::new("a", Provider::OpenAi).with_api_key("sk-1234567890abcdef");
        let debug = format!("{config:?}");
        assert!(debug.contains("sk-1...cdef"));
        assert!(!debug.contains("1234567890"));
    }

    #[test]
    fn test_mask_short_key() {
        assert_eq!(mask_api_key("short"), "****");
    }

    #[test]
    fn test_endpoint_changed() {
        let a = BackendConfig::new("a", Provider::OpenAi).with_model("gpt-4o");
        let b = a.clone().with_priority(3);
        assert!(!a.endpoint_changed(&b));
        let c = a.clone().with_model("gpt-4o-mini");
        assert!(a.endpoint_changed(&c));
    }

    #[test]
    fn test_validate_rejects_negative_cost() {
        let config = BackendConfig::new("a", Provider::OpenAi).with_cost(-1.0);
        assert!(config.validate().is_err());
        assert!(BackendConfig::new(" ", Provider::OpenAi).validate().is_err());
        assert!(BackendConfig::new("a", Provider::OpenAi)
            .with_quality_weight(1.5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_quality_weight_falls_back_to_provider() {
        let config = BackendConfig::new("a", Provider::Anthropic);
        assert!((config.effective_quality_weight() - 0.95).abs() < f64::EPSILON);
        let config = config.with_quality_weight(0.4);
        assert!((config.effective_quality_weight() - 0.4).abs() < f64::EPSILON);
    }
}
