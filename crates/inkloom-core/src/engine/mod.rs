//! Execution Engine
//!
//! Walks an [`ExecutionPlan`](crate::agents::ExecutionPlan) stage by stage.
//! Roles inside a stage run concurrently, bounded by the usable backend
//! count; the next stage starts only after every role in the current one
//! has a terminal outcome. A role whose dependency did not succeed is
//! skipped and never reaches the dispatcher.
//!
//! # Module Structure
//!
//! - `types`: PipelineRequest, PipelineResult, RoleOutcome, EngineConfig, PromptComposer
//! - `execution`: stage loop, per-role dispatch and cancellation

mod execution;
mod types;

#[cfg(test)]
mod tests;

pub use types::{
    EngineConfig, PassthroughComposer, PipelineRequest, PipelineResult, PipelineStatus,
    PromptComposer, RoleOutcome, RoleSuccess, SkipReason,
};

use crate::agents::{AgentCoordinator, ExecutionPlan, PlanError};
use crate::error::Result;
use inkloom_llm::Dispatcher;
use std::sync::Arc;

/// Runs pipeline requests through the dispatcher
pub struct ExecutionEngine {
    /// Shared dispatcher
    dispatcher: Arc<Dispatcher>,
    /// Strategy table
    coordinator: AgentCoordinator,
    /// Configuration
    config: EngineConfig,
    /// Folds upstream outputs into dependent payloads
    composer: Arc<dyn PromptComposer>,
}

impl ExecutionEngine {
    /// Create an engine with the passthrough composer
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, config: EngineConfig) -> Self {
        Self {
            dispatcher,
            coordinator: AgentCoordinator::new(),
            config,
            composer: Arc::new(PassthroughComposer),
        }
    }

    /// Replace the prompt composer
    #[must_use]
    pub fn with_composer(mut self, composer: Arc<dyn PromptComposer>) -> Self {
        self.composer = composer;
        self
    }

    /// Dispatcher used for role tasks
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Plan a request against the current usable backend count
    pub fn plan(&self, request: &PipelineRequest) -> Result<ExecutionPlan> {
        let usable = self.dispatcher.store().list_usable().len();
        if usable == 0 {
            return Err(PlanError::NoUsableBackends.into());
        }
        Ok(self.coordinator.plan(usable, &request.roles)?)
    }
}
