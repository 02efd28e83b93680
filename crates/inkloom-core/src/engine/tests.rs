
    use super::*;
    use crate::agents::{AgentRole, CoordinationStrategy};
    use crate::error::Error;
    use inkloom_llm::{
        BackendConfig, BackendError, BackendRegistry, BackendSelector, CircuitBreakerConfig,
        DispatchError, DispatcherConfig, MockAdapter, PromptPayload, Provider, SelectionStrategy,
    };
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn setup(backends: usize, config: EngineConfig) -> (ExecutionEngine, MockAdapter) {
        let configs: Vec<BackendConfig> = (0..backends)
            .map(|i| {
                BackendConfig::new(format!("backend-{i}"), Provider::Custom)
                    .with_cost(0.001 * (i + 1) as f64)
            })
            .collect();
        let registry = Arc::new(
            BackendRegistry::from_configs(&configs, CircuitBreakerConfig::default()).unwrap(),
        );
        let adapter = MockAdapter::new();
        let dispatcher = Dispatcher::new(
            registry,
            Arc::new(adapter.clone()),
            BackendSelector::new(SelectionStrategy::MinimizeCost),
            DispatcherConfig::new()
                .with_base_backoff(Duration::from_millis(5))
                .with_max_backoff(Duration::from_millis(20))
                .with_jitter(false),
        );
        (ExecutionEngine::new(Arc::new(dispatcher), config), adapter)
    }

    fn request(roles: &[AgentRole]) -> PipelineRequest {
        roles.iter().fold(PipelineRequest::new(roles.to_vec()), |req, role| {
            req.with_payload(*role, PromptPayload::new(role.as_str()))
        })
    }

    const SERIAL_ROLES: [AgentRole; 5] = [
        AgentRole::Reader,
        AgentRole::Analyst,
        AgentRole::Planner,
        AgentRole::Writer,
        AgentRole::Critic,
    ];

    #[tokio::test]
    async fn test_serial_run_completes() {
        let (engine, adapter) = setup(1, EngineConfig::default());

        let result = engine.run(&request(&SERIAL_ROLES)).await.unwrap();
        assert_eq!(result.status, PipelineStatus::Completed);
        assert_eq!(result.strategy, CoordinationStrategy::Serial);
        assert_eq!(result.outcomes.len(), 5);
        assert_eq!(adapter.calls().len(), 5);
        let prompts: Vec<String> = adapter.calls().into_iter().map(|c| c.prompt).collect();
        assert_eq!(prompts, vec!["reader", "analyst", "planner", "writer", "critic"]);
    }

    #[tokio::test]
    async fn test_failed_dependency_skips_dependents() {
        let (engine, adapter) = setup(1, EngineConfig::default());
        adapter.fail_prompt("planner", BackendError::Transient("503".to_string()));

        let result = engine.run(&request(&SERIAL_ROLES)).await.unwrap();
        assert_eq!(result.status, PipelineStatus::Partial);
        assert!(matches!(
            result.outcome(AgentRole::Planner),
            Some(RoleOutcome::Failed { dispatches: 3, .. })
        ));
        assert_eq!(
            result.outcome(AgentRole::Writer),
            Some(&RoleOutcome::Skipped(SkipReason::DependencyFailed(
                AgentRole::Planner
            )))
        );
        assert_eq!(
            result.outcome(AgentRole::Critic),
            Some(&RoleOutcome::Skipped(SkipReason::DependencyFailed(
                AgentRole::Writer
            )))
        );
        assert!(!adapter.saw_prompt("writer"));
        assert!(!adapter.saw_prompt("critic"));
    }

    #[tokio::test]
    async fn test_role_redispatched_after_failures() {
        let (engine, adapter) = setup(1, EngineConfig::default());
        adapter.push_failure("backend-0", BackendError::Transient("reset".to_string()));
        adapter.push_failure("backend-0", BackendError::Transient("reset".to_string()));

        let result = engine.run(&request(&[AgentRole::Reader])).await.unwrap();
        assert_eq!(result.status, PipelineStatus::Completed);
        match result.outcome(AgentRole::Reader) {
            Some(RoleOutcome::Succeeded(success)) => {
                assert_eq!(success.dispatches, 3);
                assert_eq!(success.backend_calls, 3);
                assert_eq!(success.metadata.call_count(), 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_dispatch_when_limit_is_one() {
        let config = EngineConfig::default().with_max_dispatches_per_role(1);
        let (engine, adapter) = setup(1, config);
        adapter.push_failure("backend-0", BackendError::Transient("reset".to_string()));

        let result = engine.run(&request(&[AgentRole::Reader])).await.unwrap();
        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(adapter.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_no_usable_backends() {
        let (engine, _adapter) = setup(0, EngineConfig::default());
        let err = engine.run(&request(&SERIAL_ROLES)).await.unwrap_err();
        assert!(matches!(err, Error::Plan(PlanError::NoUsableBackends)));
        assert!(engine.plan(&request(&SERIAL_ROLES)).is_err());
    }

    #[tokio::test]
    async fn test_missing_payload_rejected() {
        let (engine, adapter) = setup(1, EngineConfig::default());
        let req = PipelineRequest::new(vec![AgentRole::Reader]);

        let err = engine.run(&req).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unscheduled_roles_do_not_affect_status() {
        let (engine, _adapter) = setup(1, EngineConfig::default());
        let result = engine
            .run(&request(&[AgentRole::Reader, AgentRole::Archivist]))
            .await
            .unwrap();
        assert_eq!(result.status, PipelineStatus::Completed);
        assert_eq!(result.unscheduled, vec![AgentRole::Archivist]);
        assert!(result.outcome(AgentRole::Archivist).is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let (engine, adapter) = setup(2, EngineConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = engine
            .run_with_cancel(&request(&SERIAL_ROLES), &cancel)
            .await
            .unwrap();
        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(result.outcomes.values().all(RoleOutcome::is_skipped));
        assert!(adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_aborts_in_flight_role() {
        let (engine, adapter) = setup(1, EngineConfig::default());
        let adapter = adapter.with_delay(Duration::from_millis(500));
        let engine = ExecutionEngine::new(
            Arc::new(Dispatcher::new(
                engine.dispatcher().store().clone(),
                Arc::new(adapter.clone()),
                BackendSelector::default(),
                DispatcherConfig::default(),
            )),
            EngineConfig::default(),
        );

        let req = request(&SERIAL_ROLES).with_timeout(Duration::from_millis(50));
        let started = std::time::Instant::now();
        let result = engine.run(&req).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(400));
        match result.outcome(AgentRole::Reader) {
            Some(RoleOutcome::Failed { error, .. }) => assert!(error.is_cancelled()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        for role in &SERIAL_ROLES[1..] {
            assert_eq!(
                result.outcome(*role),
                Some(&RoleOutcome::Skipped(SkipReason::Cancelled))
            );
        }
        assert_eq!(adapter.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_slot_affinity_pins_assigned_backend() {
        let config = EngineConfig::default().with_slot_affinity(true);
        let (engine, adapter) = setup(2, config);

        let result = engine
            .run(&request(&[AgentRole::Reader, AgentRole::Analyst]))
            .await
            .unwrap();
        assert_eq!(result.status, PipelineStatus::Completed);

        let backend_of = |role| match result.outcome(role) {
            Some(RoleOutcome::Succeeded(s)) => s.backend.clone(),
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(backend_of(AgentRole::Reader), "backend-0");
        assert_eq!(backend_of(AgentRole::Analyst), "backend-1");
        assert_eq!(adapter.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_without_affinity_strategy_decides() {
        let (engine, _adapter) = setup(2, EngineConfig::default());
        let result = engine
            .run(&request(&[AgentRole::Reader, AgentRole::Analyst]))
            .await
            .unwrap();
        for outcome in result.outcomes.values() {
            match outcome {
                RoleOutcome::Succeeded(s) => assert_eq!(s.backend, "backend-0"),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    struct UpstreamComposer;

    impl PromptComposer for UpstreamComposer {
        fn compose(
            &self,
            role: AgentRole,
            mut payload: PromptPayload,
            upstream: &BTreeMap<AgentRole, String>,
        ) -> PromptPayload {
            if role == AgentRole::Analyst {
                payload.prompt = format!("analyze: {}", upstream.len());
            }
            payload
        }
    }

    #[tokio::test]
    async fn test_composer_sees_upstream_outputs() {
        let (engine, adapter) = setup(1, EngineConfig::default());
        let engine = engine.with_composer(Arc::new(UpstreamComposer));

        engine
            .run(&request(&[AgentRole::Reader, AgentRole::Analyst]))
            .await
            .unwrap();
        assert!(adapter.saw_prompt("analyze: 1"));
    }

    #[tokio::test]
    async fn test_strategy_forwarded_to_dispatcher() {
        let (engine, _adapter) = setup(2, EngineConfig::default());
        let req = request(&[AgentRole::Reader]).with_strategy(SelectionStrategy::MaximizeQuality);

        let result = engine.run(&req).await.unwrap();
        match result.outcome(AgentRole::Reader) {
            Some(RoleOutcome::Succeeded(s)) => {
                assert_eq!(s.metadata.strategy, SelectionStrategy::MaximizeQuality);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_status_aggregation() {
        let ok = RoleOutcome::Succeeded(RoleSuccess {
            text: "x".to_string(),
            backend: "a".to_string(),
            tokens_used: 1,
            cost: 0.0,
            dispatches: 1,
            backend_calls: 1,
            metadata: Default::default(),
        });
        let failed = RoleOutcome::Failed {
            error: DispatchError::NoCandidates {
                metadata: Default::default(),
            },
            dispatches: 1,
        };
        let skipped = RoleOutcome::Skipped(SkipReason::Cancelled);

        assert_eq!(PipelineStatus::from_outcomes([&ok, &ok]), PipelineStatus::Completed);
        assert_eq!(PipelineStatus::from_outcomes([&ok, &failed]), PipelineStatus::Partial);
        assert_eq!(
            PipelineStatus::from_outcomes([&failed, &skipped]),
            PipelineStatus::Failed
        );
        assert_eq!(PipelineStatus::from_outcomes(std::iter::empty()), PipelineStatus::Failed);
    }
