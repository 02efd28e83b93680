//! Dispatcher - retry/failover state machine
//!
//! One dispatch walks the ranked candidate list once:
//!
//! ```text
//! Selecting -> Attempting(i) -> Success
//!                  |  ^
//!                  v  |
//!              Retryable(i+1, backoff)
//!                  |
//!                  v
//!              Exhausted
//! ```
//!
//! A backend is never called twice in the same dispatch. Throttled and
//! rate-limited candidates are skipped without backoff, and a provider's
//! `Retry-After` keeps that backend out of rotation for the requested time.
//! Authentication and configuration failures force the circuit open and skip
//! without backoff. Transient failures back off exponentially before the next
//! candidate; the exponent counts transient failures only.
//!
//! # Module Structure
//!
//! - `config`: DispatcherConfig (backoff, cache)
//! - `types`: DispatchResult, DispatchMetadata, AttemptRecord, DispatchError

mod config;
mod types;


pub use config::DispatcherConfig;
pub use types::{AttemptOutcome, AttemptRecord, DispatchError, DispatchMetadata, DispatchResult};

use crate::adapter::{AdapterResponse, BackendAdapter};
use crate::cache::{CachedResponse, ResponseCache};
use crate::descriptor::{BackendDescriptor, CallOutcome};
use crate::error::{BackendError, FailureKind};
use crate::selector::{BackendSelector, RequestSpec};
use crate::store::BackendStore;
use crate::token::{estimate_payload_tokens, estimate_tokens};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

enum DispatchState {
    Selecting,
    Attempting { index: usize },
    Retryable { next: usize, delay: Duration },
    Success(Box<DispatchResult>),
    Exhausted,
}

enum CallResult {
    Response(Result<AdapterResponse, BackendError>),
    Cancelled,
}

/// Routes requests to backends with failover
pub struct Dispatcher {
    store: Arc<dyn BackendStore>,
    adapter: Arc<dyn BackendAdapter>,
    selector: BackendSelector,
    config: DispatcherConfig,
    cache: Option<ResponseCache>,
}

impl Dispatcher {
    /// Create a dispatcher
    #[must_use]
    pub fn new(
        store: Arc<dyn BackendStore>,
        adapter: Arc<dyn BackendAdapter>,
        selector: BackendSelector,
        config: DispatcherConfig,
    ) -> Self {
        let cache = config.cache_enabled.then(ResponseCache::default);
        Self {
            store,
            adapter,
            selector,
            config,
            cache,
        }
    }

    /// Replace the response cache
    #[must_use]
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Backend store this dispatcher records into
    #[must_use]
    pub fn store(&self) -> &Arc<dyn BackendStore> {
        &self.store
    }

    /// Selector used for ranking
    #[must_use]
    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    /// Dispatcher configuration
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Dispatch without an external cancellation signal
    pub async fn dispatch(&self, request: &RequestSpec) -> Result<DispatchResult, DispatchError> {
        self.dispatch_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Dispatch a request, aborting at the next boundary once `cancel` fires
    #[instrument(skip(self, request, cancel), fields(role = request.role.as_deref().unwrap_or("-")))]
    pub async fn dispatch_with_cancel(
        &self,
        request: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<DispatchResult, DispatchError> {
        let started = Instant::now();
        let mut metadata = DispatchMetadata {
            strategy: self.selector.strategy_for(request),
            ..DispatchMetadata::default()
        };

        let cache_key = match (&self.cache, request.cacheable) {
            (Some(cache), true) => {
                let key = ResponseCache::key_for(&request.payload);
                if let Some(hit) = cache.get(&key) {
                    metadata.cached = true;
                    metadata.elapsed_ms = elapsed_ms(started);
                    return Ok(DispatchResult {
                        text: hit.text,
                        backend: hit.backend,
                        tokens_used: hit.tokens_used,
                        cost: 0.0,
                        latency_ms: 0,
                        metadata,
                    });
                }
                Some(key)
            }
            _ => None,
        };

        let mut candidates: Vec<BackendDescriptor> = Vec::new();
        let mut last_error: Option<BackendError> = None;
        let mut transient_failures: u32 = 0;
        let mut state = DispatchState::Selecting;

        loop {
            state = match state {
                DispatchState::Selecting => {
                    candidates = self.selector.select(request, self.store.list_usable());
                    metadata.candidates = candidates.iter().map(|d| d.name().to_string()).collect();
                    if candidates.is_empty() {
                        metadata.elapsed_ms = elapsed_ms(started);
                        warn!("No candidate backend available");
                        return Err(DispatchError::NoCandidates { metadata });
                    }
                    DispatchState::Attempting { index: 0 }
                }

                DispatchState::Attempting { index } if index >= candidates.len() => {
                    DispatchState::Exhausted
                }

                DispatchState::Attempting { index } => {
                    if cancel.is_cancelled() {
                        metadata.elapsed_ms = elapsed_ms(started);
                        return Err(DispatchError::Cancelled { metadata });
                    }

                    let backend = &candidates[index];
                    let name = backend.name();

                    if !self.store.is_available(name) {
                        debug!(backend = %name, "Circuit opened since ranking, skipping");
                        metadata.attempts.push(record(name, AttemptOutcome::SkippedCircuitOpen, 0));
                        DispatchState::Attempting { index: index + 1 }
                    } else if !self.store.try_acquire(name) {
                        debug!(backend = %name, "Local rate limit, skipping");
                        self.store
                            .record_outcome(name, &CallOutcome::failure(FailureKind::RateLimited, 0));
                        metadata.attempts.push(record(name, AttemptOutcome::SkippedThrottled, 0));
                        DispatchState::Attempting { index: index + 1 }
                    } else {
                        let call_started = Instant::now();
                        let result = self.call(backend, request, cancel).await;
                        let latency_ms = elapsed_ms(call_started);

                        match result {
                            CallResult::Cancelled => {
                                metadata.attempts.push(record(name, AttemptOutcome::Cancelled, latency_ms));
                                metadata.elapsed_ms = elapsed_ms(started);
                                return Err(DispatchError::Cancelled { metadata });
                            }
                            CallResult::Response(Ok(response)) => {
                                let latency_ms = if response.latency_ms > 0 {
                                    response.latency_ms
                                } else {
                                    latency_ms
                                };
                                let tokens_used = if response.tokens_used > 0 {
                                    response.tokens_used
                                } else if request.estimated_tokens > 0 {
                                    request.estimated_tokens
                                } else {
                                    estimate_payload_tokens(&request.payload)
                                        + estimate_tokens(&response.text)
                                };
                                let cost = backend.cost_for(tokens_used);
                                self.store
                                    .record_outcome(name, &CallOutcome::success(latency_ms, tokens_used, cost));
                                metadata.attempts.push(record(name, AttemptOutcome::Succeeded, latency_ms));

                                if let (Some(cache), Some(key)) = (&self.cache, cache_key.as_ref()) {
                                    cache.insert(
                                        key.clone(),
                                        CachedResponse {
                                            text: response.text.clone(),
                                            backend: name.to_string(),
                                            tokens_used,
                                        },
                                    );
                                }

                                DispatchState::Success(Box::new(DispatchResult {
                                    text: response.text,
                                    backend: name.to_string(),
                                    tokens_used,
                                    cost,
                                    latency_ms,
                                    metadata: DispatchMetadata::default(),
                                }))
                            }
                            CallResult::Response(Err(error)) => {
                                let kind = error.kind();
                                self.store
                                    .record_outcome(name, &CallOutcome::failure(kind, latency_ms));
                                metadata
                                    .attempts
                                    .push(record(name, AttemptOutcome::Failed(kind), latency_ms));
                                warn!(backend = %name, attempt = index + 1, reason = %kind, error = %error, "Backend call failed");
                                if let BackendError::RateLimited {
                                    retry_after: Some(retry_after),
                                } = &error
                                {
                                    self.store.throttle(name, *retry_after);
                                }
                                last_error = Some(error);

                                let has_next = index + 1 < candidates.len();
                                match kind {
                                    FailureKind::Transient if has_next => {
                                        let delay = self.config.calculate_delay(transient_failures);
                                        transient_failures += 1;
                                        DispatchState::Retryable {
                                            next: index + 1,
                                            delay,
                                        }
                                    }
                                    _ => DispatchState::Attempting { index: index + 1 },
                                }
                            }
                        }
                    }
                }

                DispatchState::Retryable { next, delay } => {
                    if let Some(last) = metadata.attempts.last_mut() {
                        last.backoff_ms = delay.as_millis() as u64;
                    }
                    debug!(delay_ms = delay.as_millis() as u64, "Backing off before next candidate");
                    tokio::select! {
                        () = tokio::time::sleep(delay) => DispatchState::Attempting { index: next },
                        () = cancel.cancelled() => {
                            metadata.elapsed_ms = elapsed_ms(started);
                            return Err(DispatchError::Cancelled { metadata });
                        }
                    }
                }

                DispatchState::Success(mut result) => {
                    metadata.elapsed_ms = elapsed_ms(started);
                    info!(
                        backend = %result.backend,
                        calls = metadata.call_count(),
                        elapsed_ms = metadata.elapsed_ms,
                        "Dispatch succeeded"
                    );
                    result.metadata = metadata;
                    return Ok(*result);
                }

                DispatchState::Exhausted => {
                    metadata.elapsed_ms = elapsed_ms(started);
                    warn!(
                        calls = metadata.call_count(),
                        elapsed_ms = metadata.elapsed_ms,
                        "All candidates exhausted"
                    );
                    return Err(DispatchError::Exhausted {
                        metadata,
                        last_error,
                    });
                }
            };
        }
    }

    async fn call(
        &self,
        backend: &BackendDescriptor,
        request: &RequestSpec,
        cancel: &CancellationToken,
    ) -> CallResult {
        let timeout = backend.timeout();
        tokio::select! {
            result = tokio::time::timeout(timeout, self.adapter.generate(backend, &request.payload)) => {
                CallResult::Response(result.unwrap_or_else(|_| {
                    Err(BackendError::Transient(format!(
                        "request timed out after {}ms",
                        timeout.as_millis()
                    )))
                }))
            }
            () = cancel.cancelled() => CallResult::Cancelled,
        }
    }
}

fn record(backend: &str, outcome: AttemptOutcome, latency_ms: u64) -> AttemptRecord {
    AttemptRecord {
        backend: backend.to_string(),
        outcome,
        latency_ms,
        backoff_ms: 0,
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
