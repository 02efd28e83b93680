//! Request and strategy types for backend selection

use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Selection Strategy
// ============================================================================

/// Objective used to rank candidate backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Cheapest per 1K tokens first
    MinimizeCost,
    /// Lowest average latency first
    MaximizeSpeed,
    /// Highest quality weight first
    MaximizeQuality,
    /// Weighted blend of cost, latency and quality
    #[default]
    Balanced,
}

impl SelectionStrategy {
    /// All strategies
    pub const ALL: [SelectionStrategy; 4] = [
        SelectionStrategy::MinimizeCost,
        SelectionStrategy::MaximizeSpeed,
        SelectionStrategy::MaximizeQuality,
        SelectionStrategy::Balanced,
    ];

    /// Configuration identifier
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MinimizeCost => "minimize_cost",
            Self::MaximizeSpeed => "maximize_speed",
            Self::MaximizeQuality => "maximize_quality",
            Self::Balanced => "balanced",
        }
    }
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionStrategy {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| crate::error::Error::Config(format!("unknown selection strategy '{s}'")))
    }
}

/// Weights of the balanced objective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalancedWeights {
    /// Weight of normalized cost
    pub cost: f64,
    /// Weight of normalized latency
    pub latency: f64,
    /// Weight of `1 - quality`
    pub quality: f64,
}

impl Default for BalancedWeights {
    fn default() -> Self {
        Self {
            cost: 0.4,
            latency: 0.3,
            quality: 0.3,
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// Opaque prompt content produced by the prompt-template layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptPayload {
    /// System prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// User prompt
    pub prompt: String,
    /// Model to request instead of the backend's configured one
    #[serde(default)]
    pub model_override: Option<String>,
    /// Upper bound on generated tokens
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl PromptPayload {
    /// Create a payload from a user prompt
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Set the generation limit
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// One outbound generation call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSpec {
    /// Prompt content
    pub payload: PromptPayload,
    /// Tokens to bill when the backend reports none (0 = estimate from the
    /// prompt and response text)
    pub estimated_tokens: u64,
    /// Capability tag a backend must advertise
    pub required_capability: Option<String>,
    /// Restrict candidates to one provider
    pub provider: Option<Provider>,
    /// Ranking objective (`None` = process default)
    pub strategy: Option<SelectionStrategy>,
    /// Pipeline role issuing the request, for logs
    pub role: Option<String>,
    /// Backend to try first when it is a candidate
    pub preferred_backend: Option<String>,
    /// Whether the response may be served from or stored in the cache
    pub cacheable: bool,
}

impl RequestSpec {
    /// Create a request with default routing
    #[must_use]
    pub fn new(payload: PromptPayload) -> Self {
        Self {
            payload,
            cacheable: true,
            ..Self::default()
        }
    }

    /// Set the ranking objective
    #[must_use]
    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Require a capability tag
    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capability = Some(capability.into());
        self
    }

    /// Pin to a provider
    #[must_use]
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Tag with the issuing role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Prefer one backend when it qualifies
    #[must_use]
    pub fn with_preferred_backend(mut self, name: impl Into<String>) -> Self {
        self.preferred_backend = Some(name.into());
        self
    }

    /// Set expected token usage
    #[must_use]
    pub fn with_estimated_tokens(mut self, tokens: u64) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    /// Enable or disable response caching
    #[must_use]
    pub fn with_cache(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }
}
