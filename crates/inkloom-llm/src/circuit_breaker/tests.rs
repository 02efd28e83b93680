
    use super::*;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(3)
            .with_base_cooldown(Duration::from_secs(10))
            .with_max_cooldown(Duration::from_secs(35))
    }

    #[test]
    fn test_circuit_breaker_config_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.base_cooldown, Duration::from_secs(60));
        assert_eq!(config.max_cooldown, Duration::from_secs(900));
    }

    #[test]
    fn test_cooldown_doubles_up_to_cap() {
        let config = fast_config();
        assert_eq!(config.cooldown_for(1), Duration::from_secs(10));
        assert_eq!(config.cooldown_for(2), Duration::from_secs(20));
        assert_eq!(config.cooldown_for(3), Duration::from_secs(35));
        assert_eq!(config.cooldown_for(40), Duration::from_secs(35));
    }

    #[test]
    fn test_circuit_breaker_initial_state() {
        let cb = CircuitBreaker::with_defaults("test");
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_execute());
        assert_eq!(cb.consecutive_failures(), 0);
        assert!(cb.open_until().is_none());
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = CircuitBreaker::new("test", fast_config());
        let now = Instant::now();

        assert!(!cb.record_failure_at(now));
        assert!(!cb.record_failure_at(now));
        assert_eq!(cb.state_at(now), CircuitState::Closed);

        assert!(cb.record_failure_at(now));
        assert_eq!(cb.state_at(now), CircuitState::Open);
        assert!(!cb.can_execute_at(now));
    }

    #[test]
    fn test_half_open_after_cooldown() {
        let cb = CircuitBreaker::new("test", fast_config());
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure_at(now);
        }

        let later = now + Duration::from_secs(10);
        assert_eq!(cb.state_at(later), CircuitState::HalfOpen);
        assert!(cb.can_execute_at(later));
    }

    #[test]
    fn test_failed_probe_retrips_with_longer_cooldown() {
        let cb = CircuitBreaker::new("test", fast_config());
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure_at(now);
        }

        let probe = now + Duration::from_secs(11);
        assert!(cb.record_failure_at(probe));
        assert_eq!(cb.trips(), 2);
        assert_eq!(cb.open_until(), Some(probe + Duration::from_secs(20)));
        assert!(!cb.can_execute_at(probe + Duration::from_secs(19)));
    }

    #[test]
    fn test_success_resets_streak_and_trips() {
        let cb = CircuitBreaker::new("test", fast_config());
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure_at(now);
        }
        cb.record_success();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
        assert_eq!(cb.trips(), 0);
    }

    #[test]
    fn test_failures_while_open_are_ignored() {
        let cb = CircuitBreaker::new("test", fast_config());
        let now = Instant::now();
        for _ in 0..3 {
            cb.record_failure_at(now);
        }
        assert!(!cb.record_failure_at(now + Duration::from_secs(1)));
        assert_eq!(cb.trips(), 1);
    }

    #[test]
    fn test_force_open_uses_max_cooldown() {
        let cb = CircuitBreaker::new("test", fast_config());
        let now = Instant::now();
        cb.force_open_at(now);

        assert_eq!(cb.state_at(now), CircuitState::Open);
        assert_eq!(cb.open_until(), Some(now + Duration::from_secs(35)));
        assert!(cb.consecutive_failures() >= 3);
    }

    #[test]
    fn test_reset() {
        let cb = CircuitBreaker::new("test", fast_config());
        cb.force_open();
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_execute());
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(format!("{}", CircuitState::Closed), "Closed");
        assert_eq!(format!("{}", CircuitState::Open), "Open");
        assert_eq!(format!("{}", CircuitState::HalfOpen), "HalfOpen");
    }
