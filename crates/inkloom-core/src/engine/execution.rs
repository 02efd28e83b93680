use super::types::{
    PipelineRequest, PipelineResult, PipelineStatus, RoleOutcome, RoleSuccess, SkipReason,
};
use super::ExecutionEngine;
use crate::agents::{AgentRole, AgentRoleAssignment, PlanError, Stage};
use crate::error::{Error, Result};
use chrono::Utc;
use inkloom_llm::{DispatchError, PromptPayload, RequestSpec, SelectionStrategy};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

impl ExecutionEngine {
    /// Run a pipeline request to completion
    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineResult> {
        self.run_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Run a pipeline request, stopping early once `cancel` fires
    ///
    /// After cancellation no new role starts; roles that had not started are
    /// reported as skipped. The request timeout (or the configured one)
    /// cancels the run the same way.
    pub async fn run_with_cancel(
        &self,
        request: &PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult> {
        self.execute(Uuid::new_v4(), request, cancel).await
    }

    #[instrument(skip_all, fields(run_id = %run_id))]
    async fn execute(
        &self,
        run_id: Uuid,
        request: &PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult> {
        let started_at = Utc::now();
        let started = Instant::now();

        let usable = self.dispatcher.store().list_usable();
        if usable.is_empty() {
            warn!("No usable backends, refusing to plan");
            return Err(PlanError::NoUsableBackends.into());
        }
        let slot_backends: Vec<String> = usable.iter().map(|d| d.name().to_string()).collect();

        let plan = self.coordinator.plan(usable.len(), &request.roles)?;

        let missing: Vec<String> = plan
            .assignments()
            .filter(|a| !request.payloads.contains_key(&a.role))
            .map(|a| a.role.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "missing payload for role(s): {}",
                missing.join(", ")
            )));
        }

        info!(
            strategy = %plan.strategy,
            backends = usable.len(),
            stages = plan.stages.len(),
            roles = plan.role_count(),
            "Starting pipeline run"
        );

        let run_token = cancel.child_token();
        let timer = request.timeout.or_else(|| self.config.timeout()).map(|limit| {
            let token = run_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!(timeout_ms = limit.as_millis() as u64, "Pipeline run timed out");
                token.cancel();
            })
        });

        let mut outcomes: BTreeMap<AgentRole, RoleOutcome> = BTreeMap::new();
        for (index, stage) in plan.stages.iter().enumerate() {
            if run_token.is_cancelled() {
                debug!(stage = index, "Run cancelled, skipping stage");
                for role in stage.roles() {
                    outcomes.insert(role, RoleOutcome::Skipped(SkipReason::Cancelled));
                }
                continue;
            }

            let stage_outcomes = self
                .run_stage(
                    index,
                    stage,
                    request,
                    &slot_backends,
                    &outcomes,
                    &run_token,
                )
                .await;
            outcomes.extend(stage_outcomes);
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        let status = PipelineStatus::from_outcomes(outcomes.values());
        let elapsed = started.elapsed();
        info!(
            status = %status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline run finished"
        );

        Ok(PipelineResult {
            run_id,
            strategy: plan.strategy,
            stages: plan.stage_roles(),
            outcomes,
            unscheduled: plan.unscheduled.clone(),
            status,
            started_at,
            elapsed,
        })
    }

    /// Run one stage and return an outcome for each of its roles
    async fn run_stage(
        &self,
        index: usize,
        stage: &Stage,
        request: &PipelineRequest,
        slot_backends: &[String],
        finished: &BTreeMap<AgentRole, RoleOutcome>,
        cancel: &CancellationToken,
    ) -> Vec<(AgentRole, RoleOutcome)> {
        let mut results = Vec::with_capacity(stage.len());
        let mut runnable = Vec::new();

        for assignment in &stage.assignments {
            let failed_dependency = assignment
                .depends_on
                .iter()
                .find(|dep| !finished.get(*dep).is_some_and(RoleOutcome::is_success));
            match failed_dependency.copied() {
                Some(dep) => {
                    info!(role = %assignment.role, dependency = %dep, "Dependency did not succeed, skipping role");
                    results.push((
                        assignment.role,
                        RoleOutcome::Skipped(SkipReason::DependencyFailed(dep)),
                    ));
                }
                None => runnable.push(assignment),
            }
        }

        if runnable.is_empty() {
            return results;
        }

        let slots = slot_backends.len().min(runnable.len()).max(1);
        debug!(stage = index, roles = runnable.len(), slots, "Running stage");
        let semaphore = Semaphore::new(slots);

        let tasks = runnable.into_iter().map(|assignment| {
            let upstream: BTreeMap<AgentRole, String> = assignment
                .depends_on
                .iter()
                .filter_map(|dep| {
                    finished
                        .get(dep)
                        .and_then(RoleOutcome::text)
                        .map(|text| (*dep, text.to_string()))
                })
                .collect();
            let payload = request
                .payloads
                .get(&assignment.role)
                .cloned()
                .unwrap_or_default();
            let payload = self.composer.compose(assignment.role, payload, &upstream);
            let slot_backend = if self.config.slot_affinity {
                slot_backends.get(assignment.backend_slot).map(String::as_str)
            } else {
                None
            };
            let semaphore = &semaphore;

            async move {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = semaphore.acquire() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return (assignment.role, RoleOutcome::Skipped(SkipReason::Cancelled));
                };
                let outcome = self
                    .run_role(assignment, payload, request.strategy, slot_backend, cancel)
                    .await;
                (assignment.role, outcome)
            }
        });

        results.extend(futures::future::join_all(tasks).await);
        results
    }

    /// Dispatch one role, re-dispatching after failures up to the configured limit
    async fn run_role(
        &self,
        assignment: &AgentRoleAssignment,
        payload: PromptPayload,
        strategy: Option<SelectionStrategy>,
        slot_backend: Option<&str>,
        cancel: &CancellationToken,
    ) -> RoleOutcome {
        let role = assignment.role;
        let mut spec = RequestSpec::new(payload).with_role(role.as_str());
        if let Some(strategy) = strategy {
            spec = spec.with_strategy(strategy);
        }
        if let Some(backend) = slot_backend {
            spec = spec.with_preferred_backend(backend);
        }

        let max_dispatches = self.config.max_dispatches_per_role.max(1);
        let mut dispatches = 0u32;
        let mut backend_calls = 0usize;

        loop {
            dispatches += 1;
            match self.dispatcher.dispatch_with_cancel(&spec, cancel).await {
                Ok(result) => {
                    backend_calls += result.metadata.call_count();
                    info!(
                        role = %role,
                        backend = %result.backend,
                        dispatches,
                        tokens = result.tokens_used,
                        "Role completed"
                    );
                    return RoleOutcome::Succeeded(RoleSuccess {
                        text: result.text,
                        backend: result.backend,
                        tokens_used: result.tokens_used,
                        cost: result.cost,
                        dispatches,
                        backend_calls,
                        metadata: result.metadata,
                    });
                }
                Err(error) if error.is_cancelled() || dispatches >= max_dispatches => {
                    warn!(role = %role, dispatches, error = %error, "Role failed");
                    return RoleOutcome::Failed { error, dispatches };
                }
                Err(error) => {
                    backend_calls += error.metadata().call_count();
                    let delay = self.dispatcher.config().calculate_delay(dispatches - 1);
                    debug!(
                        role = %role,
                        dispatches,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Dispatch failed, re-dispatching"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {
                            warn!(role = %role, dispatches, "Role cancelled during backoff");
                            return RoleOutcome::Failed {
                                error: DispatchError::Cancelled {
                                    metadata: error.metadata().clone(),
                                },
                                dispatches,
                            };
                        }
                    }
                }
            }
        }
    }
}
