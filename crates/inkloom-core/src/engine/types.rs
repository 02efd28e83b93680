//! Engine request, outcome and configuration types

use crate::agents::{AgentRole, CoordinationStrategy};
use chrono::{DateTime, Utc};
use inkloom_llm::{DispatchError, DispatchMetadata, PromptPayload, SelectionStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use uuid::Uuid;

fn default_max_dispatches() -> u32 {
    3
}

/// Execution engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fresh dispatches allowed per role before it is marked failed
    #[serde(default = "default_max_dispatches")]
    pub max_dispatches_per_role: u32,
    /// Put a role's assigned backend slot first in its candidate list
    #[serde(default)]
    pub slot_affinity: bool,
    /// Run timeout in seconds (0 = none)
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_dispatches_per_role: default_max_dispatches(),
            slot_affinity: false,
            timeout_secs: 0,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set dispatches per role
    #[must_use]
    pub fn with_max_dispatches_per_role(mut self, dispatches: u32) -> Self {
        self.max_dispatches_per_role = dispatches.max(1);
        self
    }

    /// Enable or disable slot affinity
    #[must_use]
    pub fn with_slot_affinity(mut self, enabled: bool) -> Self {
        self.slot_affinity = enabled;
        self
    }

    /// Set the run timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Run timeout, if configured
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// One pipeline invocation
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    /// Roles to execute
    pub roles: Vec<AgentRole>,
    /// Prompt payload per role
    pub payloads: HashMap<AgentRole, PromptPayload>,
    /// Ranking objective for every role-task (`None` = process default)
    pub strategy: Option<SelectionStrategy>,
    /// Overrides the configured run timeout
    pub timeout: Option<Duration>,
}

impl PipelineRequest {
    /// Request for the full role set
    #[must_use]
    pub fn all_roles() -> Self {
        Self::new(AgentRole::ALL.to_vec())
    }

    /// Request for specific roles
    #[must_use]
    pub fn new(roles: Vec<AgentRole>) -> Self {
        Self {
            roles,
            ..Self::default()
        }
    }

    /// Set the payload for one role
    #[must_use]
    pub fn with_payload(mut self, role: AgentRole, payload: PromptPayload) -> Self {
        self.payloads.insert(role, payload);
        self
    }

    /// Set the ranking objective
    #[must_use]
    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set the run timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Why a role was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "role")]
pub enum SkipReason {
    /// A dependency did not succeed
    DependencyFailed(AgentRole),
    /// The run was cancelled or timed out before the role started
    Cancelled,
}

/// Successful role output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleSuccess {
    /// Generated text
    pub text: String,
    /// Backend that produced it
    pub backend: String,
    /// Tokens consumed
    pub tokens_used: u64,
    /// Cost in USD
    pub cost: f64,
    /// Dispatcher calls made for this role
    pub dispatches: u32,
    /// Backend calls across all dispatches
    pub backend_calls: usize,
    /// Bookkeeping of the successful dispatch
    pub metadata: DispatchMetadata,
}

/// Terminal outcome of one role
#[derive(Debug, Clone, PartialEq)]
pub enum RoleOutcome {
    /// Role produced output
    Succeeded(RoleSuccess),
    /// Every dispatch failed
    Failed {
        /// Last dispatch error
        error: DispatchError,
        /// Dispatcher calls made
        dispatches: u32,
    },
    /// Role was never attempted
    Skipped(SkipReason),
}

impl RoleOutcome {
    /// Whether the role succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Whether the role was skipped
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Output text on success
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Succeeded(success) => Some(&success.text),
            _ => None,
        }
    }

    /// Short label for reports
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Skipped(_) => "skipped",
        }
    }
}

/// Aggregate pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Every scheduled role succeeded
    Completed,
    /// Some roles succeeded
    Partial,
    /// No role succeeded
    Failed,
}

impl PipelineStatus {
    /// Aggregate role outcomes
    #[must_use]
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a RoleOutcome>) -> Self {
        let mut any = false;
        let mut all = true;
        for outcome in outcomes {
            if outcome.is_success() {
                any = true;
            } else {
                all = false;
            }
        }
        match (any, all) {
            (true, true) => Self::Completed,
            (true, false) => Self::Partial,
            (false, _) => Self::Failed,
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Run identifier
    pub run_id: Uuid,
    /// Coordination strategy used
    pub strategy: CoordinationStrategy,
    /// Roles per stage, as planned
    pub stages: Vec<Vec<AgentRole>>,
    /// Outcome per scheduled role
    pub outcomes: BTreeMap<AgentRole, RoleOutcome>,
    /// Requested roles the strategy did not cover
    pub unscheduled: Vec<AgentRole>,
    /// Aggregate status
    pub status: PipelineStatus,
    /// Run start time
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl PipelineResult {
    /// Outcome of one role
    #[must_use]
    pub fn outcome(&self, role: AgentRole) -> Option<&RoleOutcome> {
        self.outcomes.get(&role)
    }

    /// Total cost across successful roles
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.outcomes
            .values()
            .filter_map(|o| match o {
                RoleOutcome::Succeeded(s) => Some(s.cost),
                _ => None,
            })
            .sum()
    }

    /// JSON summary for reporting
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        let outcomes: serde_json::Map<String, serde_json::Value> = self
            .outcomes
            .iter()
            .map(|(role, outcome)| {
                let value = match outcome {
                    RoleOutcome::Succeeded(s) => serde_json::json!({
                        "status": outcome.label(),
                        "backend": s.backend,
                        "tokens": s.tokens_used,
                        "cost": s.cost,
                        "dispatches": s.dispatches,
                        "cached": s.metadata.cached,
                    }),
                    RoleOutcome::Failed { error, dispatches } => serde_json::json!({
                        "status": outcome.label(),
                        "error": error.to_string(),
                        "dispatches": dispatches,
                    }),
                    RoleOutcome::Skipped(reason) => serde_json::json!({
                        "status": outcome.label(),
                        "reason": reason,
                    }),
                };
                (role.to_string(), value)
            })
            .collect();

        serde_json::json!({
            "runId": self.run_id.to_string(),
            "strategy": self.strategy,
            "status": self.status,
            "stages": self.stages,
            "outcomes": outcomes,
            "unscheduled": self.unscheduled,
            "startedAt": self.started_at.to_rfc3339(),
            "elapsedMs": self.elapsed.as_millis() as u64,
            "totalCost": self.total_cost(),
        })
    }
}

/// Folds upstream role outputs into a dependent role's payload
pub trait PromptComposer: Send + Sync {
    /// Build the payload sent for `role`
    fn compose(
        &self,
        role: AgentRole,
        payload: PromptPayload,
        upstream: &BTreeMap<AgentRole, String>,
    ) -> PromptPayload;
}

/// Sends payloads unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughComposer;

impl PromptComposer for PassthroughComposer {
    fn compose(
        &self,
        _role: AgentRole,
        payload: PromptPayload,
        _upstream: &BTreeMap<AgentRole, String>,
    ) -> PromptPayload {
        payload
    }
}
