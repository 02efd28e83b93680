//! Mock adapter for testing
//!
//! Replies are scripted per backend and every call is logged, so tests can
//! assert which backends were attempted and in what order.

use crate::adapter::{AdapterResponse, BackendAdapter};
use crate::descriptor::BackendDescriptor;
use crate::error::BackendError;
use crate::selector::PromptPayload;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One logged call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Backend that was called
    pub backend: String,
    /// User prompt sent
    pub prompt: String,
}

#[derive(Debug, Default)]
struct MockState {
    scripted: HashMap<String, VecDeque<Result<String, BackendError>>>,
    always_fail: HashMap<String, BackendError>,
    failing_prompts: HashMap<String, BackendError>,
    latency_ms: HashMap<String, u64>,
    calls: Vec<MockCall>,
}

/// A mock adapter that returns queued replies or a default success
#[derive(Debug, Clone, Default)]
pub struct MockAdapter {
    state: Arc<Mutex<MockState>>,
    delay: Option<Duration>,
}

impl MockAdapter {
    /// Create a new mock adapter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a successful reply for a backend
    pub fn push_success(&self, backend: &str, text: impl Into<String>) {
        self.lock()
            .scripted
            .entry(backend.to_string())
            .or_default()
            .push_back(Ok(text.into()));
    }

    /// Queue a failure for a backend
    pub fn push_failure(&self, backend: &str, error: BackendError) {
        self.lock()
            .scripted
            .entry(backend.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Fail every call to a backend once its queue is drained
    pub fn fail_always(&self, backend: &str, error: BackendError) {
        self.lock().always_fail.insert(backend.to_string(), error);
    }

    /// Fail every call carrying this prompt, on any backend
    pub fn fail_prompt(&self, prompt: &str, error: BackendError) {
        self.lock().failing_prompts.insert(prompt.to_string(), error);
    }

    /// Report this latency for a backend
    pub fn set_latency(&self, backend: &str, latency_ms: u64) {
        self.lock().latency_ms.insert(backend.to_string(), latency_ms);
    }

    /// All calls made so far
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Backends called, in order
    #[must_use]
    pub fn called_backends(&self) -> Vec<String> {
        self.lock().calls.iter().map(|c| c.backend.clone()).collect()
    }

    /// Whether any call carried this prompt
    #[must_use]
    pub fn saw_prompt(&self, prompt: &str) -> bool {
        self.lock().calls.iter().any(|c| c.prompt == prompt)
    }
}

#[async_trait::async_trait]
impl BackendAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        backend: &BackendDescriptor,
        payload: &PromptPayload,
    ) -> Result<AdapterResponse, BackendError> {
        let (reply, latency_ms) = {
            let mut state = self.lock();
            state.calls.push(MockCall {
                backend: backend.name().to_string(),
                prompt: payload.prompt.clone(),
            });
            let scripted = match state.failing_prompts.get(&payload.prompt) {
                Some(error) => Some(Err(error.clone())),
                None => state
                    .scripted
                    .get_mut(backend.name())
                    .and_then(VecDeque::pop_front),
            };
            let reply = match scripted {
                Some(reply) => reply,
                None => match state.always_fail.get(backend.name()) {
                    Some(error) => Err(error.clone()),
                    None => Ok(format!("mock response from {}", backend.name())),
                },
            };
            let latency_ms = state.latency_ms.get(backend.name()).copied().unwrap_or(1);
            (reply, latency_ms)
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        reply.map(|text| AdapterResponse {
            tokens_used: 0,
            text,
            latency_ms,
        })
    }
}
