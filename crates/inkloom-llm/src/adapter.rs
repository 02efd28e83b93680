//! Backend adapter trait
//!
//! An adapter turns a prompt payload into one provider call and reports the
//! result in a uniform shape. Error classification happens here so the
//! dispatcher never sees provider-specific status codes.

use crate::descriptor::BackendDescriptor;
use crate::error::BackendError;
use crate::selector::PromptPayload;

/// Uniform result of one successful backend call
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterResponse {
    /// Generated text
    pub text: String,
    /// Tokens the provider reported (0 if it did not report usage)
    pub tokens_used: u64,
    /// Wall-clock latency of the call
    pub latency_ms: u64,
}

/// Trait for provider adapters
#[async_trait::async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Adapter name, for logs
    fn name(&self) -> &str;

    /// Perform one call against `backend`
    async fn generate(
        &self,
        backend: &BackendDescriptor,
        payload: &PromptPayload,
    ) -> std::result::Result<AdapterResponse, BackendError>;
}
