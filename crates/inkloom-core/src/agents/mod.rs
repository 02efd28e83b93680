//! Agents - roles, coordination strategies and execution plans
//!
//! # Module Structure
//!
//! - `role`: AgentRole
//! - `coordinator`: strategy table and AgentCoordinator
//! - `plan`: ExecutionPlan, Stage, AgentRoleAssignment

mod coordinator;
mod plan;
mod role;

pub use coordinator::{AgentCoordinator, CoordinationStrategy, StrategyInfo};
pub use plan::{AgentRoleAssignment, ExecutionPlan, PlanError, Stage};
pub use role::AgentRole;
