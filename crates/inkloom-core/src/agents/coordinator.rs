//! Agent Coordinator - strategy table keyed by usable backend count
//!
//! | Count | Strategy          | Stages                                  |
//! |-------|-------------------|-----------------------------------------|
//! | 1     | serial            | R, A, P, W, C                           |
//! | 2     | dual-parallel     | [R A], P, W, C                          |
//! | 3     | triangular        | [R A E], P, [W S], C                    |
//! | 4     | quad-coordination | [R A E P], [W S], C, Ar                 |
//! | 5     | swarm             | [R A E P], W, [S C], Ar                 |
//!
//! Plans are a pure function of the clamped count and the requested roles.

use super::plan::{AgentRoleAssignment, ExecutionPlan, PlanError};
use super::role::AgentRole;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use AgentRole::{Analyst, Archivist, Critic, Extractor, Planner, Reader, Stylist, Writer};

/// Coordination topology chosen from the usable backend count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStrategy {
    /// One backend: everything in sequence
    Serial,
    /// Two backends: readers in parallel, then a serial chain
    DualParallel,
    /// Three backends: three-way intake, styling beside writing
    Triangular,
    /// Four backends: four-way intake, archiving at the end
    QuadCoordination,
    /// Five backends: wide intake, review beside styling
    Swarm,
}

/// One row of a strategy table
#[derive(Debug, Clone, Copy)]
struct RoleSpec {
    role: AgentRole,
    slot: usize,
    priority: u32,
    parallel: bool,
    depends_on: &'static [AgentRole],
}

const fn assign(
    role: AgentRole,
    slot: usize,
    priority: u32,
    parallel: bool,
    depends_on: &'static [AgentRole],
) -> RoleSpec {
    RoleSpec {
        role,
        slot,
        priority,
        parallel,
        depends_on,
    }
}

const SERIAL: &[RoleSpec] = &[
    assign(Reader, 0, 1, false, &[]),
    assign(Analyst, 0, 2, false, &[Reader]),
    assign(Planner, 0, 3, false, &[Analyst]),
    assign(Writer, 0, 4, false, &[Planner]),
    assign(Critic, 0, 5, false, &[Writer]),
];

const DUAL_PARALLEL: &[RoleSpec] = &[
    assign(Reader, 0, 1, true, &[]),
    assign(Analyst, 1, 1, true, &[]),
    assign(Planner, 0, 2, false, &[Reader, Analyst]),
    assign(Writer, 1, 3, false, &[Planner]),
    assign(Critic, 0, 4, false, &[Writer]),
];

const TRIANGULAR: &[RoleSpec] = &[
    assign(Reader, 0, 1, true, &[]),
    assign(Analyst, 1, 1, true, &[]),
    assign(Extractor, 2, 1, true, &[]),
    assign(Planner, 0, 2, false, &[Reader, Analyst, Extractor]),
    assign(Writer, 1, 3, false, &[Planner]),
    assign(Stylist, 2, 3, true, &[Planner]),
    assign(Critic, 0, 4, false, &[Writer, Stylist]),
];

const QUAD_COORDINATION: &[RoleSpec] = &[
    assign(Reader, 0, 1, true, &[]),
    assign(Analyst, 1, 1, true, &[]),
    assign(Extractor, 2, 1, true, &[]),
    assign(Planner, 3, 1, true, &[]),
    assign(Writer, 0, 2, false, &[Reader, Analyst, Extractor, Planner]),
    assign(Stylist, 1, 2, true, &[Reader, Analyst, Extractor, Planner]),
    assign(Critic, 2, 3, false, &[Writer, Stylist]),
    assign(Archivist, 3, 4, false, &[Critic]),
];

const SWARM: &[RoleSpec] = &[
    assign(Reader, 0, 1, true, &[]),
    assign(Analyst, 1, 1, true, &[]),
    assign(Extractor, 2, 1, true, &[]),
    assign(Planner, 3, 1, true, &[]),
    assign(Writer, 4, 2, false, &[Reader, Analyst, Extractor, Planner]),
    assign(Stylist, 0, 2, true, &[Writer]),
    assign(Critic, 1, 3, true, &[Writer]),
    assign(Archivist, 2, 4, false, &[Stylist, Critic]),
];

impl CoordinationStrategy {
    /// All strategies, indexed by backend count - 1
    pub const ALL: [CoordinationStrategy; 5] = [
        CoordinationStrategy::Serial,
        CoordinationStrategy::DualParallel,
        CoordinationStrategy::Triangular,
        CoordinationStrategy::QuadCoordination,
        CoordinationStrategy::Swarm,
    ];

    /// Clamp a usable backend count into the table range
    #[must_use]
    pub fn clamp_count(usable_backends: usize) -> usize {
        usable_backends.clamp(1, 5)
    }

    /// Strategy for a usable backend count (clamped to 1..=5)
    #[must_use]
    pub fn for_backend_count(usable_backends: usize) -> Self {
        Self::ALL[Self::clamp_count(usable_backends) - 1]
    }

    /// Stable identifier
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::DualParallel => "dual_parallel",
            Self::Triangular => "triangular",
            Self::QuadCoordination => "quad_coordination",
            Self::Swarm => "swarm",
        }
    }

    /// Human-readable summary
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Serial => "single backend, every role runs in sequence",
            Self::DualParallel => "reader and analyst in parallel, then planner, writer, critic in sequence",
            Self::Triangular => "three-way intake, planner, writer beside stylist, critic last",
            Self::QuadCoordination => "four-way intake, writer beside stylist, critic, archivist last",
            Self::Swarm => "four-way intake, writer alone, stylist beside critic, archivist last",
        }
    }

    fn table(&self) -> &'static [RoleSpec] {
        match self {
            Self::Serial => SERIAL,
            Self::DualParallel => DUAL_PARALLEL,
            Self::Triangular => TRIANGULAR,
            Self::QuadCoordination => QUAD_COORDINATION,
            Self::Swarm => SWARM,
        }
    }

    /// Roles this strategy schedules
    #[must_use]
    pub fn roles(&self) -> Vec<AgentRole> {
        self.table().iter().map(|s| s.role).collect()
    }

    /// Full assignment table
    #[must_use]
    pub fn assignments(&self) -> Vec<AgentRoleAssignment> {
        self.table()
            .iter()
            .map(|s| AgentRoleAssignment {
                role: s.role,
                backend_slot: s.slot,
                priority: s.priority,
                can_run_in_parallel: s.parallel,
                depends_on: s.depends_on.iter().copied().collect(),
            })
            .collect()
    }
}

impl std::fmt::Display for CoordinationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy summary for UI and CLI consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyInfo {
    /// Strategy chosen for the count
    pub strategy: CoordinationStrategy,
    /// Clamped backend count
    pub backend_count: usize,
    /// Summary
    pub description: &'static str,
    /// Slot assignment table
    pub assignments: Vec<AgentRoleAssignment>,
}

/// Builds execution plans from the strategy table
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentCoordinator;

impl AgentCoordinator {
    /// Create a coordinator
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Describe the strategy for a backend count
    #[must_use]
    pub fn strategy_info(&self, usable_backends: usize) -> StrategyInfo {
        let strategy = CoordinationStrategy::for_backend_count(usable_backends);
        StrategyInfo {
            strategy,
            backend_count: CoordinationStrategy::clamp_count(usable_backends),
            description: strategy.description(),
            assignments: strategy.assignments(),
        }
    }

    /// Build a plan for the full role set
    pub fn plan_all(&self, usable_backends: usize) -> Result<ExecutionPlan, PlanError> {
        self.plan(usable_backends, &AgentRole::ALL)
    }

    /// Build a plan for the requested roles
    ///
    /// Requested roles missing from the strategy are reported as unscheduled.
    /// Dependencies on roles outside the request are dropped.
    pub fn plan(
        &self,
        usable_backends: usize,
        requested: &[AgentRole],
    ) -> Result<ExecutionPlan, PlanError> {
        if usable_backends == 0 {
            return Err(PlanError::NoUsableBackends);
        }

        let strategy = CoordinationStrategy::for_backend_count(usable_backends);
        let backend_count = CoordinationStrategy::clamp_count(usable_backends);
        let requested: BTreeSet<AgentRole> = requested.iter().copied().collect();
        let covered: BTreeSet<AgentRole> = strategy.roles().into_iter().collect();

        let assignments: Vec<AgentRoleAssignment> = strategy
            .assignments()
            .into_iter()
            .filter(|a| requested.contains(&a.role))
            .map(|mut a| {
                a.depends_on.retain(|dep| requested.contains(dep));
                a
            })
            .collect();
        let unscheduled: Vec<AgentRole> = requested.difference(&covered).copied().collect();

        let plan = ExecutionPlan::from_assignments(strategy, backend_count, assignments, unscheduled)?;
        debug!(
            strategy = %plan.strategy,
            stages = ?plan.stage_roles(),
            unscheduled = ?plan.unscheduled,
            "Built execution plan"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_for_count_clamps() {
        assert_eq!(CoordinationStrategy::for_backend_count(0), CoordinationStrategy::Serial);
        assert_eq!(CoordinationStrategy::for_backend_count(1), CoordinationStrategy::Serial);
        assert_eq!(CoordinationStrategy::for_backend_count(3), CoordinationStrategy::Triangular);
        assert_eq!(CoordinationStrategy::for_backend_count(9), CoordinationStrategy::Swarm);
    }

    #[test]
    fn test_zero_backends_fails_fast() {
        assert_eq!(
            AgentCoordinator::new().plan_all(0),
            Err(PlanError::NoUsableBackends)
        );
    }

    #[test]
    fn test_writer_and_archivist_never_parallel() {
        for strategy in CoordinationStrategy::ALL {
            for assignment in strategy.assignments() {
                if matches!(assignment.role, AgentRole::Writer | AgentRole::Archivist) {
                    assert!(!assignment.can_run_in_parallel, "{strategy}: {}", assignment.role);
                }
            }
        }
    }

    #[test]
    fn test_slots_within_count() {
        for (i, strategy) in CoordinationStrategy::ALL.iter().enumerate() {
            for assignment in strategy.assignments() {
                assert!(assignment.backend_slot <= i);
            }
        }
    }

    #[test]
    fn test_subset_drops_outside_dependencies() {
        let plan = AgentCoordinator::new()
            .plan(3, &[AgentRole::Writer, AgentRole::Critic])
            .unwrap();
        assert_eq!(
            plan.stage_roles(),
            vec![vec![AgentRole::Writer], vec![AgentRole::Critic]]
        );
        let critic = plan.assignment(AgentRole::Critic).unwrap();
        assert_eq!(critic.depends_on, BTreeSet::from([AgentRole::Writer]));
    }

    #[test]
    fn test_unscheduled_roles_reported() {
        let plan = AgentCoordinator::new().plan_all(2).unwrap();
        assert_eq!(
            plan.unscheduled,
            vec![AgentRole::Extractor, AgentRole::Stylist, AgentRole::Archivist]
        );
        assert_eq!(plan.role_count(), 5);

        assert_eq!(
            AgentCoordinator::new().plan(1, &[AgentRole::Archivist]),
            Err(PlanError::EmptyRoleSet)
        );
    }

    #[test]
    fn test_strategy_info() {
        let info = AgentCoordinator::new().strategy_info(7);
        assert_eq!(info.strategy, CoordinationStrategy::Swarm);
        assert_eq!(info.backend_count, 5);
        assert_eq!(info.assignments.len(), 8);
        assert!(!info.description.is_empty());
    }
}
