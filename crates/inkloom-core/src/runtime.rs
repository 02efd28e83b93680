//! Pipeline runtime
//!
//! Owns the backend registry and the execution engine built from a
//! [`PipelineConfig`]. Runs hold a read lock for their whole duration and
//! reload takes the write lock, so a reload always lands between runs.
//! Backend statistics survive reloads.

use crate::agents::{AgentCoordinator, AgentRole, ExecutionPlan, PlanError, StrategyInfo};
use crate::config::PipelineConfig;
use crate::engine::{
    ExecutionEngine, PassthroughComposer, PipelineRequest, PipelineResult, PromptComposer,
};
use crate::error::Result;
use inkloom_llm::{
    BackendAdapter, BackendRegistry, BackendSelector, BackendStats, BackendStore, Dispatcher,
    ReloadSummary,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

struct RuntimeState {
    config: PipelineConfig,
    engine: ExecutionEngine,
}

/// Configured pipeline ready to run requests
pub struct Runtime {
    registry: Arc<BackendRegistry>,
    adapter: Arc<dyn BackendAdapter>,
    composer: Arc<dyn PromptComposer>,
    coordinator: AgentCoordinator,
    state: RwLock<RuntimeState>,
}

impl Runtime {
    /// Build a runtime from configuration
    pub fn from_config(config: PipelineConfig, adapter: Arc<dyn BackendAdapter>) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(BackendRegistry::from_configs(
            &config.backends,
            config.circuit_breaker.to_breaker_config(),
        )?);
        let composer: Arc<dyn PromptComposer> = Arc::new(PassthroughComposer);
        let engine = build_engine(&config, &registry, &adapter, &composer);

        info!(
            backends = registry.len(),
            default_strategy = %config.default_strategy,
            "Pipeline runtime initialized"
        );

        Ok(Self {
            registry,
            adapter,
            composer,
            coordinator: AgentCoordinator::new(),
            state: RwLock::new(RuntimeState { config, engine }),
        })
    }

    /// Replace the prompt composer
    #[must_use]
    pub fn with_composer(mut self, composer: Arc<dyn PromptComposer>) -> Self {
        let state = self.state.get_mut();
        state.engine = build_engine(&state.config, &self.registry, &self.adapter, &composer);
        self.composer = composer;
        self
    }

    /// Backend registry
    #[must_use]
    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Current configuration
    pub async fn config(&self) -> PipelineConfig {
        self.state.read().await.config.clone()
    }

    /// Run a pipeline request
    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineResult> {
        self.run_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Run a pipeline request with an external cancellation signal
    pub async fn run_with_cancel(
        &self,
        request: &PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult> {
        let state = self.state.read().await;
        state.engine.run_with_cancel(request, cancel).await
    }

    /// Apply a new configuration between runs
    ///
    /// Backends keep their statistics. Circuit breaker thresholds are fixed
    /// at construction and are not changed by a reload.
    pub async fn reload(&self, config: PipelineConfig) -> Result<ReloadSummary> {
        config.validate()?;
        let mut state = self.state.write().await;
        let summary = self.registry.apply_config(&config.backends)?;
        state.engine = build_engine(&config, &self.registry, &self.adapter, &self.composer);
        state.config = config;

        info!(
            added = summary.added.len(),
            updated = summary.updated.len(),
            disabled = summary.disabled.len(),
            circuit_reset = summary.circuit_reset.len(),
            "Configuration reloaded"
        );
        Ok(summary)
    }

    /// Load configuration from disk and the environment, then reload
    pub async fn reload_from_path(&self, path: Option<&Path>) -> Result<ReloadSummary> {
        let config = PipelineConfig::load(path)?;
        self.reload(config).await
    }

    /// Statistics snapshot for every backend
    #[must_use]
    pub fn stats(&self) -> Vec<BackendStats> {
        self.registry.stats()
    }

    /// Number of backends that can take traffic right now
    #[must_use]
    pub fn usable_count(&self) -> usize {
        self.registry.list_usable().len()
    }

    /// Plan the given roles without running them
    pub fn plan_preview(&self, roles: &[AgentRole]) -> Result<ExecutionPlan> {
        let usable = self.usable_count();
        if usable == 0 {
            return Err(PlanError::NoUsableBackends.into());
        }
        Ok(self.coordinator.plan(usable, roles)?)
    }

    /// Strategy the current usable backend count selects
    #[must_use]
    pub fn strategy_info(&self) -> StrategyInfo {
        self.coordinator.strategy_info(self.usable_count())
    }
}

fn build_engine(
    config: &PipelineConfig,
    registry: &Arc<BackendRegistry>,
    adapter: &Arc<dyn BackendAdapter>,
    composer: &Arc<dyn PromptComposer>,
) -> ExecutionEngine {
    let selector = BackendSelector::new(config.default_strategy).with_weights(config.weights);
    let store: Arc<dyn BackendStore> = registry.clone();
    let dispatcher = Dispatcher::new(store, Arc::clone(adapter), selector, config.dispatcher.clone());
    ExecutionEngine::new(Arc::new(dispatcher), config.engine.clone())
        .with_composer(Arc::clone(composer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PipelineStatus;
    use inkloom_llm::{BackendConfig, MockAdapter, PromptPayload, Provider, SelectionStrategy};

    fn config(names: &[&str]) -> PipelineConfig {
        PipelineConfig {
            backends: names
                .iter()
                .map(|n| BackendConfig::new(*n, Provider::Custom))
                .collect(),
            ..PipelineConfig::default()
        }
    }

    fn reader_request() -> PipelineRequest {
        PipelineRequest::new(vec![AgentRole::Reader])
            .with_payload(AgentRole::Reader, PromptPayload::new("read"))
    }

    #[tokio::test]
    async fn test_run_records_stats() {
        let runtime = Runtime::from_config(config(&["a"]), Arc::new(MockAdapter::new())).unwrap();
        let result = tokio_test::assert_ok!(runtime.run(&reader_request()).await);
        assert_eq!(result.status, PipelineStatus::Completed);

        let stats = runtime.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_requests, 1);
        assert_eq!(stats[0].successful_requests, 1);
    }

    #[tokio::test]
    async fn test_reload_keeps_stats_and_disables_missing() {
        let runtime =
            Runtime::from_config(config(&["a", "b"]), Arc::new(MockAdapter::new())).unwrap();
        runtime.run(&reader_request()).await.unwrap();

        let summary = runtime.reload(config(&["a", "c"])).await.unwrap();
        assert_eq!(summary.added, vec!["c".to_string()]);
        assert_eq!(summary.disabled, vec!["b".to_string()]);
        assert_eq!(runtime.usable_count(), 2);

        let a = runtime.stats().into_iter().find(|s| s.name == "a").unwrap();
        assert_eq!(a.total_requests, 1);
        let b = runtime.stats().into_iter().find(|s| s.name == "b").unwrap();
        assert!(!b.enabled);
    }

    #[tokio::test]
    async fn test_reload_changes_default_strategy() {
        let runtime = Runtime::from_config(config(&["a"]), Arc::new(MockAdapter::new())).unwrap();
        let mut next = config(&["a"]);
        next.default_strategy = SelectionStrategy::MaximizeSpeed;
        runtime.reload(next).await.unwrap();

        assert_eq!(
            runtime.config().await.default_strategy,
            SelectionStrategy::MaximizeSpeed
        );
        let result = runtime.run(&reader_request()).await.unwrap();
        let outcome = result.outcome(AgentRole::Reader).unwrap();
        match outcome {
            crate::engine::RoleOutcome::Succeeded(s) => {
                assert_eq!(s.metadata.strategy, SelectionStrategy::MaximizeSpeed);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_reload_leaves_runtime_untouched() {
        let runtime = Runtime::from_config(config(&["a"]), Arc::new(MockAdapter::new())).unwrap();
        assert!(runtime.reload(config(&["a", "a"])).await.is_err());
        assert_eq!(runtime.usable_count(), 1);
    }

    #[test]
    fn test_plan_preview_tracks_usable_count() {
        let runtime =
            Runtime::from_config(config(&["a", "b", "c"]), Arc::new(MockAdapter::new())).unwrap();
        let plan = runtime.plan_preview(&AgentRole::ALL).unwrap();
        assert_eq!(plan.backend_count, 3);
        assert_eq!(runtime.strategy_info().strategy, plan.strategy);

        let empty = Runtime::from_config(config(&[]), Arc::new(MockAdapter::new())).unwrap();
        assert!(empty.plan_preview(&AgentRole::ALL).is_err());
    }
}
