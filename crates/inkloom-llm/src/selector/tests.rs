
    use super::*;
    use crate::config::BackendConfig;
    use crate::provider::Provider;

    fn backend(name: &str, provider: Provider, cost: f64, latency: f64, quality: f64) -> BackendDescriptor {
        BackendDescriptor {
            config: BackendConfig::new(name, provider)
                .with_cost(cost)
                .with_quality_weight(quality),
            avg_response_time_ms: latency,
            consecutive_errors: 0,
            circuit_open_until: None,
        }
    }

    fn names(ranked: &[BackendDescriptor]) -> Vec<&str> {
        ranked.iter().map(|d| d.name()).collect()
    }

    fn pool() -> Vec<BackendDescriptor> {
        vec![
            backend("premium", Provider::Anthropic, 0.015, 900.0, 0.95),
            backend("budget", Provider::DeepSeek, 0.001, 1500.0, 0.8),
            backend("quick", Provider::OpenAi, 0.005, 300.0, 0.85),
        ]
    }

    #[test]
    fn test_minimize_cost() {
        let selector = BackendSelector::new(SelectionStrategy::MinimizeCost);
        let ranked = selector.select(&RequestSpec::default(), pool());
        assert_eq!(names(&ranked), vec!["budget", "quick", "premium"]);
    }

    #[test]
    fn test_maximize_speed() {
        let selector = BackendSelector::default();
        let request = RequestSpec::default().with_strategy(SelectionStrategy::MaximizeSpeed);
        let ranked = selector.select(&request, pool());
        assert_eq!(names(&ranked), vec!["quick", "premium", "budget"]);
    }

    #[test]
    fn test_maximize_quality() {
        let selector = BackendSelector::new(SelectionStrategy::MaximizeQuality);
        let ranked = selector.select(&RequestSpec::default(), pool());
        assert_eq!(names(&ranked), vec!["premium", "quick", "budget"]);
    }

    #[test]
    fn test_balanced_scores() {
        let candidates = pool();
        let scores = score(SelectionStrategy::Balanced, &candidates, &BalancedWeights::default());
        // premium: cost 1.0, latency 0.5, quality 0.05
        assert!((scores[0] - (0.4 + 0.15 + 0.3 * 0.05)).abs() < 1e-9);
        // budget: cost 0.0, latency 1.0, quality 0.2
        assert!((scores[1] - (0.3 + 0.3 * 0.2)).abs() < 1e-9);
        let ranked = BackendSelector::default().select(&RequestSpec::default(), candidates);
        assert_eq!(names(&ranked)[0], "quick");
    }

    #[test]
    fn test_balanced_cheaper_never_ranks_worse() {
        for (cheap, dear) in [(0.001, 0.002), (0.0, 0.5), (0.01, 0.0100001)] {
            let ranked = BackendSelector::default().select(
                &RequestSpec::default(),
                vec![
                    backend("dear", Provider::OpenAi, dear, 500.0, 0.9),
                    backend("cheap", Provider::OpenAi, cheap, 500.0, 0.9),
                ],
            );
            assert_eq!(names(&ranked), vec!["cheap", "dear"]);
        }
    }

    #[test]
    fn test_zero_spread_contributes_nothing() {
        let candidates = vec![
            backend("a", Provider::OpenAi, 0.002, 0.0, 0.9),
            backend("b", Provider::OpenAi, 0.002, 0.0, 0.9),
        ];
        let scores = score(SelectionStrategy::Balanced, &candidates, &BalancedWeights::default());
        assert!((scores[0] - 0.03).abs() < 1e-9);
        assert!((scores[0] - scores[1]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ties_broken_by_priority() {
        let mut low = backend("low", Provider::OpenAi, 0.002, 0.0, 0.9);
        low.config.priority = 5;
        let mut high = backend("high", Provider::OpenAi, 0.002, 0.0, 0.9);
        high.config.priority = 1;
        let ranked = BackendSelector::new(SelectionStrategy::MinimizeCost)
            .select(&RequestSpec::default(), vec![low, high]);
        assert_eq!(names(&ranked), vec!["high", "low"]);
    }

    #[test]
    fn test_empty_when_nothing_qualifies() {
        let selector = BackendSelector::default();
        assert!(selector.select(&RequestSpec::default(), Vec::new()).is_empty());

        let request = RequestSpec::default().with_capability("vision");
        assert!(selector.select(&request, pool()).is_empty());
    }

    #[test]
    fn test_provider_and_capability_filters() {
        let mut candidates = pool();
        candidates[2].config.capabilities.push("long_context".to_string());
        let selector = BackendSelector::default();

        let request = RequestSpec::default().with_provider(Provider::DeepSeek);
        assert_eq!(names(&selector.select(&request, candidates.clone())), vec!["budget"]);

        let request = RequestSpec::default().with_capability("long_context");
        assert_eq!(names(&selector.select(&request, candidates)), vec!["quick"]);
    }

    #[test]
    fn test_preferred_backend_moves_to_front() {
        let selector = BackendSelector::new(SelectionStrategy::MinimizeCost);
        let request = RequestSpec::default().with_preferred_backend("premium");
        let ranked = selector.select(&request, pool());
        assert_eq!(names(&ranked), vec!["premium", "budget", "quick"]);

        let request = RequestSpec::default().with_preferred_backend("absent");
        assert_eq!(names(&selector.select(&request, pool()))[0], "budget");
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("balanced".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::Balanced);
        assert_eq!(
            "maximize-speed".parse::<SelectionStrategy>().unwrap(),
            SelectionStrategy::MaximizeSpeed
        );
        assert!("fastest".parse::<SelectionStrategy>().is_err());
        assert_eq!(SelectionStrategy::default(), SelectionStrategy::Balanced);
    }
