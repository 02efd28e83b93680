//! Dispatch results, attempt records and errors

use crate::error::{BackendError, FailureKind};
use crate::selector::SelectionStrategy;
use serde::Serialize;
use thiserror::Error;

/// What happened to one candidate during a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "reason")]
pub enum AttemptOutcome {
    /// Call returned a response
    Succeeded,
    /// Call failed
    Failed(FailureKind),
    /// Circuit opened between ranking and attempt; not called
    SkippedCircuitOpen,
    /// Local rate-limit bucket empty; not called
    SkippedThrottled,
    /// Call aborted by cancellation
    Cancelled,
}

impl AttemptOutcome {
    /// Whether the backend was actually called
    #[must_use]
    pub fn was_called(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }
}

/// One step of a dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// Candidate backend
    pub backend: String,
    /// Result for this candidate
    pub outcome: AttemptOutcome,
    /// Call latency (0 when not called)
    pub latency_ms: u64,
    /// Backoff waited after this attempt
    pub backoff_ms: u64,
}

/// Bookkeeping reported with every dispatch, successful or not
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchMetadata {
    /// Strategy the candidates were ranked with
    pub strategy: SelectionStrategy,
    /// Ranked candidate names
    pub candidates: Vec<String>,
    /// Per-candidate steps, in order
    pub attempts: Vec<AttemptRecord>,
    /// Total time spent in the dispatch
    pub elapsed_ms: u64,
    /// Served from the response cache
    pub cached: bool,
}

impl DispatchMetadata {
    /// Number of backends actually called
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.outcome.was_called()).count()
    }

    /// Total backoff waited
    #[must_use]
    pub fn total_backoff_ms(&self) -> u64 {
        self.attempts.iter().map(|a| a.backoff_ms).sum()
    }
}

/// Successful dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResult {
    /// Generated text
    pub text: String,
    /// Backend that produced it
    pub backend: String,
    /// Tokens consumed (reported or estimated)
    pub tokens_used: u64,
    /// Cost in USD
    pub cost: f64,
    /// Latency of the successful call
    pub latency_ms: u64,
    /// Attempt bookkeeping
    pub metadata: DispatchMetadata,
}

/// Dispatch failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// No backend qualified; nothing was attempted
    #[error("no candidate backend available")]
    NoCandidates {
        /// Strategy and elapsed time; no candidates or attempts
        metadata: DispatchMetadata,
    },

    /// Every candidate was tried or skipped
    #[error("all candidates exhausted after {} call(s)", .metadata.call_count())]
    Exhausted {
        /// Attempt bookkeeping
        metadata: DispatchMetadata,
        /// Error from the last called backend
        last_error: Option<BackendError>,
    },

    /// Cancellation fired before a terminal outcome
    #[error("dispatch cancelled")]
    Cancelled {
        /// Attempt bookkeeping up to cancellation
        metadata: DispatchMetadata,
    },
}

impl DispatchError {
    /// Attempt bookkeeping
    #[must_use]
    pub fn metadata(&self) -> &DispatchMetadata {
        match self {
            Self::NoCandidates { metadata }
            | Self::Exhausted { metadata, .. }
            | Self::Cancelled { metadata } => metadata,
        }
    }

    /// Whether this error came from cancellation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
