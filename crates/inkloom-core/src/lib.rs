//! Inkloom Core - Agent Pipeline Scheduler
//!
//! This crate plans and runs multi-role generation pipelines:
//! - Agents: pipeline roles and the coordination strategy table
//! - Plans: dependency-ordered stages for one run
//! - Engine: concurrent stage execution with dependency skipping
//! - Runtime: configuration, hot reload and statistics
//!
//! Every role-task is routed through [`inkloom_llm::Dispatcher`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agents;
pub mod config;
pub mod engine;
pub mod error;
pub mod runtime;

pub use agents::{
    AgentCoordinator, AgentRole, AgentRoleAssignment, CoordinationStrategy, ExecutionPlan,
    PlanError, Stage, StrategyInfo,
};
pub use config::{CircuitBreakerSettings, PipelineConfig};
pub use engine::{
    EngineConfig, ExecutionEngine, PassthroughComposer, PipelineRequest, PipelineResult,
    PipelineStatus, PromptComposer, RoleOutcome, RoleSuccess, SkipReason,
};
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use runtime::Runtime;
