//! Error types for inkloom-llm

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Reason code attached to a failed backend call
///
/// Surfaced in statistics so operators can tell a flaky backend from a
/// misconfigured one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeout, 5xx, connection reset
    Transient,
    /// Provider returned 429 or the local bucket was empty
    RateLimited,
    /// 401/403 or rejected credentials
    Authentication,
    /// Unknown model, missing base URL and similar configuration faults
    InvalidConfiguration,
}

impl FailureKind {
    /// Whether this failure counts against the backend's error streak
    #[must_use]
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, Self::RateLimited)
    }

    /// Whether this failure forces the circuit open immediately
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Authentication | Self::InvalidConfiguration)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Authentication => write!(f, "authentication"),
            Self::InvalidConfiguration => write!(f, "invalid_configuration"),
        }
    }
}

/// Error returned by a backend adapter for a single call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// Timeout, 5xx, connection reset
    #[error("transient backend error: {0}")]
    Transient(String),

    /// Provider-side rate limit
    #[error("backend rate limited")]
    RateLimited {
        /// Hint from the provider, if any
        retry_after: Option<Duration>,
    },

    /// Credentials rejected
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Backend misconfigured (unknown model, bad URL)
    #[error("invalid backend configuration: {0}")]
    InvalidConfiguration(String),
}

impl BackendError {
    /// Classify this error into a reason code
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transient(_) => FailureKind::Transient,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::Authentication(_) => FailureKind::Authentication,
            Self::InvalidConfiguration(_) => FailureKind::InvalidConfiguration,
        }
    }
}

/// LLM routing error type
#[derive(Debug, Error)]
pub enum Error {
    /// Backend not present in the store
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// HTTP client could not be built
    #[error("http client error: {0}")]
    Http(String),

    /// Backend call failed
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
