//! Inkloom LLM - Backend Router
//!
//! This crate routes generation requests across interchangeable backends:
//! - Store: backend descriptors, live statistics and hot reload
//! - Rate limiter: per-backend token buckets that never block
//! - Circuit breaker: per-backend failure tracking with doubling cooldowns
//! - Selector: cost / speed / quality / balanced ranking
//! - Dispatcher: failover state machine with exponential backoff
//! - Adapters: HTTP (OpenAI-compatible and Anthropic) and a scripted mock
//! - Cache: optional response cache keyed by prompt digest

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod mock;
pub mod provider;
pub mod rate_limiter;
pub mod selector;
pub mod store;
pub mod token;

pub use adapter::{AdapterResponse, BackendAdapter};
pub use cache::{CachedResponse, ResponseCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{mask_api_key, BackendConfig};
pub use descriptor::{BackendDescriptor, BackendStats, CallOutcome};
pub use dispatcher::{
    AttemptOutcome, AttemptRecord, DispatchError, DispatchMetadata, DispatchResult, Dispatcher,
    DispatcherConfig,
};
pub use error::{BackendError, Error, FailureKind, Result};
pub use http::HttpAdapter;
pub use mock::{MockAdapter, MockCall};
pub use provider::{Provider, WireFormat};
pub use rate_limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use selector::{
    BackendSelector, BalancedWeights, PromptPayload, RequestSpec, SelectionStrategy,
};
pub use store::{BackendRegistry, BackendStore, ReloadSummary};
pub use token::{estimate_payload_tokens, estimate_tokens};
