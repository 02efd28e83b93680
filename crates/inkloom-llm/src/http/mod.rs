//! HTTP adapter
//!
//! Speaks the OpenAI-compatible chat completions format and the Anthropic
//! messages format over `reqwest`, mapping HTTP failures onto the backend
//! error taxonomy:
//!
//! - 401/403 -> authentication
//! - 400/404/422 -> invalid configuration (unknown model, bad request shape)
//! - 429 -> rate limited, honoring `Retry-After`
//! - 5xx, timeouts, connection errors -> transient

mod wire;

#[cfg(test)]
mod tests;

use crate::adapter::{AdapterResponse, BackendAdapter};
use crate::descriptor::BackendDescriptor;
use crate::error::{BackendError, Error, Result};
use crate::provider::WireFormat;
use crate::selector::PromptPayload;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};
use wire::{ChatRequest, ChatResponse, MessagesRequest, MessagesResponse, ANTHROPIC_VERSION};

/// Upper bound on error text kept from a response body
const MAX_ERROR_LEN: usize = 300;

/// Sanitize provider error text before it reaches logs
pub(crate) fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("api_key")
        || lower.contains("invalid key")
        || lower.contains("bearer")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return "API authentication error. Please check the backend's api_key.".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") {
        return "Rate limit exceeded. Please try again later.".to_string();
    }

    if error.chars().count() > MAX_ERROR_LEN {
        let truncated: String = error.chars().take(MAX_ERROR_LEN).collect();
        format!("{truncated}...(truncated)")
    } else {
        error.to_string()
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a non-success HTTP status onto the error taxonomy
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> BackendError {
    let message = format!("HTTP {}: {}", status.as_u16(), sanitize_api_error(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited { retry_after },
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            BackendError::InvalidConfiguration(message)
        }
        _ => BackendError::Transient(message),
    }
}

fn classify_transport(error: &reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Transient("request timed out".to_string())
    } else if error.is_connect() {
        BackendError::Transient("connection failed".to_string())
    } else {
        BackendError::Transient(sanitize_api_error(&error.to_string()))
    }
}

/// Adapter for HTTP backends
#[derive(Debug, Clone)]
pub struct HttpAdapter {
    client: Client,
}

impl HttpAdapter {
    /// Create an adapter with a shared connection pool
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Create an adapter around an existing client
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn endpoint(backend: &BackendDescriptor) -> std::result::Result<(WireFormat, String), BackendError> {
        let format = backend.provider().wire_format();
        if format == WireFormat::Unsupported {
            return Err(BackendError::InvalidConfiguration(format!(
                "provider '{}' has no built-in HTTP support",
                backend.provider()
            )));
        }
        let base = backend.config.effective_base_url().ok_or_else(|| {
            BackendError::InvalidConfiguration(format!(
                "backend '{}' has no base_url",
                backend.name()
            ))
        })?;
        let path = match format {
            WireFormat::Anthropic => "messages",
            _ => "chat/completions",
        };
        Ok((format, format!("{}/{path}", base.trim_end_matches('/'))))
    }
}

#[async_trait::async_trait]
impl BackendAdapter for HttpAdapter {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, backend, payload), fields(backend = %backend.name()))]
    async fn generate(
        &self,
        backend: &BackendDescriptor,
        payload: &PromptPayload,
    ) -> std::result::Result<AdapterResponse, BackendError> {
        let (format, url) = Self::endpoint(backend)?;
        let api_key = backend.config.api_key.as_deref().unwrap_or_default();
        let model = payload
            .model_override
            .as_deref()
            .unwrap_or(&backend.config.model);

        let request = self.client.post(&url).timeout(backend.timeout());
        let request = match format {
            WireFormat::Anthropic => request
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&MessagesRequest::new(model, payload)),
            _ => request
                .bearer_auth(api_key)
                .json(&ChatRequest::new(model, payload)),
        };

        debug!(model = %model, "Sending backend request");
        let started = Instant::now();
        let response = request.send().await.map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &body));
        }

        let (text, tokens_used) = match format {
            WireFormat::Anthropic => {
                let body: MessagesResponse = response
                    .json()
                    .await
                    .map_err(|e| BackendError::Transient(format!("invalid response body: {e}")))?;
                (body.text(), body.total_tokens())
            }
            _ => {
                let body: ChatResponse = response
                    .json()
                    .await
                    .map_err(|e| BackendError::Transient(format!("invalid response body: {e}")))?;
                let tokens = body.usage.as_ref().map_or(0, |u| u.total_tokens);
                let text = body
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| BackendError::Transient("no choices in response".to_string()))?;
                (text, tokens)
            }
        };

        Ok(AdapterResponse {
            text,
            tokens_used,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}
