//! Execution plans
//!
//! A plan is an ordered list of stages. Every scheduled role appears in
//! exactly one stage, and a role's dependencies all sit in earlier stages.

use super::coordinator::CoordinationStrategy;
use super::role::AgentRole;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

/// Plan construction errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Nothing to route to
    #[error("no usable backends available")]
    NoUsableBackends,

    /// None of the requested roles is part of the chosen strategy
    #[error("no schedulable roles in request")]
    EmptyRoleSet,

    /// Dependencies cannot be ordered
    #[error("dependency cycle among roles: {0:?}")]
    CyclicDependencies(Vec<AgentRole>),

    /// A constructed plan broke a structural rule
    #[error("invalid plan: {0}")]
    Invalid(String),
}

/// One role's placement in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRoleAssignment {
    /// Role
    pub role: AgentRole,
    /// Index into the usable backend list at planning time
    pub backend_slot: usize,
    /// Lower runs earlier among serial roles
    pub priority: u32,
    /// Whether the role may share a stage
    pub can_run_in_parallel: bool,
    /// Roles that must succeed first
    pub depends_on: BTreeSet<AgentRole>,
}

/// Roles that run together
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    /// Assignments in this stage, ordered by priority then role
    pub assignments: Vec<AgentRoleAssignment>,
}

impl Stage {
    /// Roles in this stage
    #[must_use]
    pub fn roles(&self) -> Vec<AgentRole> {
        self.assignments.iter().map(|a| a.role).collect()
    }

    /// Number of roles in this stage
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether the stage is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Ordered stages for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    /// Strategy the plan was built from
    pub strategy: CoordinationStrategy,
    /// Usable backend count the plan was built for (clamped)
    pub backend_count: usize,
    /// Stages in execution order
    pub stages: Vec<Stage>,
    /// Requested roles the strategy does not cover
    pub unscheduled: Vec<AgentRole>,
}

impl ExecutionPlan {
    /// Group assignments into stages
    ///
    /// Each stage takes every ready parallel-eligible role plus at most one
    /// ready serial role (lowest priority first).
    pub fn from_assignments(
        strategy: CoordinationStrategy,
        backend_count: usize,
        assignments: Vec<AgentRoleAssignment>,
        unscheduled: Vec<AgentRole>,
    ) -> Result<Self, PlanError> {
        if assignments.is_empty() {
            return Err(PlanError::EmptyRoleSet);
        }

        let mut remaining = assignments;
        let mut done: BTreeSet<AgentRole> = BTreeSet::new();
        let mut stages = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|a| a.depends_on.is_subset(&done));

            if ready.is_empty() {
                return Err(PlanError::CyclicDependencies(
                    blocked.iter().map(|a| a.role).collect(),
                ));
            }

            let (mut stage, mut serial): (Vec<_>, Vec<_>) =
                ready.into_iter().partition(|a| a.can_run_in_parallel);
            serial.sort_by_key(|a| (a.priority, a.role));

            let mut deferred = Vec::new();
            let mut serial = serial.into_iter();
            if let Some(first) = serial.next() {
                stage.push(first);
            }
            deferred.extend(serial);

            stage.sort_by_key(|a| (a.priority, a.role));
            done.extend(stage.iter().map(|a| a.role));
            stages.push(Stage { assignments: stage });

            remaining = blocked;
            remaining.extend(deferred);
        }

        let plan = Self {
            strategy,
            backend_count,
            stages,
            unscheduled,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Check the structural invariants
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut seen: BTreeSet<AgentRole> = BTreeSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            if stage.is_empty() {
                return Err(PlanError::Invalid(format!("stage {index} is empty")));
            }
            for assignment in &stage.assignments {
                if !assignment.depends_on.is_subset(&seen) {
                    return Err(PlanError::Invalid(format!(
                        "{} runs before its dependencies",
                        assignment.role
                    )));
                }
                if assignment.can_run_in_parallel && !assignment.role.allows_parallel() {
                    return Err(PlanError::Invalid(format!(
                        "{} cannot run in parallel",
                        assignment.role
                    )));
                }
                if assignment.backend_slot >= self.backend_count {
                    return Err(PlanError::Invalid(format!(
                        "{} assigned to slot {} of {}",
                        assignment.role, assignment.backend_slot, self.backend_count
                    )));
                }
            }
            if stage.assignments.iter().filter(|a| !a.can_run_in_parallel).count() > 1 {
                return Err(PlanError::Invalid(format!(
                    "stage {index} holds more than one serial role"
                )));
            }
            for role in stage.roles() {
                if !seen.insert(role) {
                    return Err(PlanError::Invalid(format!("{role} scheduled twice")));
                }
            }
        }
        Ok(())
    }

    /// Roles per stage
    #[must_use]
    pub fn stage_roles(&self) -> Vec<Vec<AgentRole>> {
        self.stages.iter().map(Stage::roles).collect()
    }

    /// All scheduled assignments in stage order
    pub fn assignments(&self) -> impl Iterator<Item = &AgentRoleAssignment> {
        self.stages.iter().flat_map(|s| s.assignments.iter())
    }

    /// Assignment of one role
    #[must_use]
    pub fn assignment(&self, role: AgentRole) -> Option<&AgentRoleAssignment> {
        self.assignments().find(|a| a.role == role)
    }

    /// Number of scheduled roles
    #[must_use]
    pub fn role_count(&self) -> usize {
        self.stages.iter().map(Stage::len).sum()
    }
}
