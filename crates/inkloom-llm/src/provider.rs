//! Supported backend providers
//!
//! This module contains the Provider enum and its static per-provider defaults
//! (base URL, wire format, quality weight).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Provider
// ============================================================================

/// External text-generation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI chat completions
    #[serde(alias = "open_ai")]
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Google Gemini
    Gemini,
    /// DeepSeek (OpenAI compatible)
    #[serde(alias = "deep_seek")]
    DeepSeek,
    /// Cohere
    Cohere,
    /// Moonshot (OpenAI compatible)
    Moonshot,
    /// 01.AI (OpenAI compatible)
    #[serde(alias = "zero_one")]
    ZeroOne,
    /// Alibaba Qwen (DashScope compatible mode)
    Qwen,
    /// Baidu ERNIE
    Ernie,
    /// ZhipuAI GLM
    Glm,
    /// Any other OpenAI-compatible endpoint
    Custom,
}

/// Wire format spoken by a provider's HTTP endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `POST {base}/chat/completions` with `messages`
    OpenAiCompatible,
    /// `POST {base}/messages` with top-level `system`
    Anthropic,
    /// No built-in HTTP support
    Unsupported,
}

impl Provider {
    /// All known providers
    pub const ALL: [Provider; 11] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Gemini,
        Provider::DeepSeek,
        Provider::Cohere,
        Provider::Moonshot,
        Provider::ZeroOne,
        Provider::Qwen,
        Provider::Ernie,
        Provider::Glm,
        Provider::Custom,
    ];

    /// Stable identifier used in configuration and logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::DeepSeek => "deepseek",
            Self::Cohere => "cohere",
            Self::Moonshot => "moonshot",
            Self::ZeroOne => "zeroone",
            Self::Qwen => "qwen",
            Self::Ernie => "ernie",
            Self::Glm => "glm",
            Self::Custom => "custom",
        }
    }

    /// Default API base URL, if the provider has a well-known one
    #[must_use]
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::DeepSeek => Some("https://api.deepseek.com/v1"),
            Self::Moonshot => Some("https://api.moonshot.cn/v1"),
            Self::ZeroOne => Some("https://api.lingyiwanwu.com/v1"),
            Self::Qwen => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
            Self::Glm => Some("https://open.bigmodel.cn/api/paas/v4"),
            Self::Gemini | Self::Cohere | Self::Ernie | Self::Custom => None,
        }
    }

    /// Wire format used by the built-in HTTP adapter
    #[must_use]
    pub fn wire_format(&self) -> WireFormat {
        match self {
            Self::OpenAi
            | Self::DeepSeek
            | Self::Moonshot
            | Self::ZeroOne
            | Self::Qwen
            | Self::Glm
            | Self::Custom => WireFormat::OpenAiCompatible,
            Self::Anthropic => WireFormat::Anthropic,
            Self::Gemini | Self::Cohere | Self::Ernie => WireFormat::Unsupported,
        }
    }

    /// Static quality weight in `[0, 1]`, used when configuration does not
    /// supply one
    #[must_use]
    pub fn default_quality_weight(&self) -> f64 {
        match self {
            Self::Anthropic => 0.95,
            Self::OpenAi => 0.9,
            Self::Gemini => 0.85,
            Self::DeepSeek => 0.8,
            Self::Qwen => 0.75,
            Self::Glm => 0.7,
            Self::Moonshot => 0.7,
            Self::ZeroOne => 0.65,
            Self::Cohere => 0.6,
            Self::Ernie => 0.6,
            Self::Custom => 0.5,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], "");
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| crate::error::Error::Config(format!("unknown provider '{s}'")))
    }
}
