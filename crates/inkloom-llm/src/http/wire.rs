//! Request and response bodies for the supported wire formats

use crate::selector::PromptPayload;
use serde::{Deserialize, Serialize};

/// Anthropic requires `max_tokens`
pub(crate) const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 4096;
/// Anthropic API version header value
pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";

// ============================================================================
// OpenAI-compatible chat completions
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl<'a> ChatRequest<'a> {
    pub fn new(model: &'a str, payload: &'a PromptPayload) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = payload.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &payload.prompt,
        });
        Self {
            model,
            messages,
            max_tokens: payload.max_tokens,
            temperature: payload.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatUsage {
    #[serde(default)]
    pub total_tokens: u64,
}

// ============================================================================
// Anthropic messages
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl<'a> MessagesRequest<'a> {
    pub fn new(model: &'a str, payload: &'a PromptPayload) -> Self {
        Self {
            model,
            max_tokens: payload.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
            system: payload.system_prompt.as_deref(),
            messages: vec![ChatMessage {
                role: "user",
                content: &payload.prompt,
            }],
            temperature: payload.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl MessagesResponse {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn total_tokens(&self) -> u64 {
        self.usage
            .as_ref()
            .map_or(0, |u| u.input_tokens + u.output_tokens)
    }
}
