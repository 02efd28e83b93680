
    use super::*;
    use crate::config::BackendConfig;
    use crate::provider::Provider;

    fn descriptor(config: BackendConfig) -> BackendDescriptor {
        BackendDescriptor {
            config,
            avg_response_time_ms: 0.0,
            consecutive_errors: 0,
            circuit_open_until: None,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, None, "").kind(),
            crate::error::FailureKind::Authentication
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, None, "").kind(),
            crate::error::FailureKind::Authentication
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, None, "model not found").kind(),
            crate::error::FailureKind::InvalidConfiguration
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, None, "").kind(),
            crate::error::FailureKind::Transient
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(7)), ""),
            BackendError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));
        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_sanitize_hides_credentials() {
        let sanitized = sanitize_api_error("Incorrect API key provided: sk-abc123");
        assert!(!sanitized.contains("sk-abc123"));

        let long = "x".repeat(400);
        assert!(sanitize_api_error(&long).ends_with("...(truncated)"));
        assert_eq!(sanitize_api_error("boom"), "boom");
    }

    #[test]
    fn test_endpoint_per_wire_format() {
        let openai = descriptor(BackendConfig::new("a", Provider::OpenAi));
        let (format, url) = HttpAdapter::endpoint(&openai).unwrap();
        assert_eq!(format, WireFormat::OpenAiCompatible);
        assert_eq!(url, "https://api.openai.com/v1/chat/completions");

        let anthropic = descriptor(
            BackendConfig::new("b", Provider::Anthropic).with_base_url("http://localhost:9000/v1/"),
        );
        let (format, url) = HttpAdapter::endpoint(&anthropic).unwrap();
        assert_eq!(format, WireFormat::Anthropic);
        assert_eq!(url, "http://localhost:9000/v1/messages");
    }

    #[test]
    fn test_endpoint_errors_are_configuration_faults() {
        let custom = descriptor(BackendConfig::new("c", Provider::Custom));
        assert!(matches!(
            HttpAdapter::endpoint(&custom),
            Err(BackendError::InvalidConfiguration(_))
        ));
        let ernie = descriptor(BackendConfig::new("d", Provider::Ernie).with_base_url("http://x"));
        assert!(matches!(
            HttpAdapter::endpoint(&ernie),
            Err(BackendError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_chat_request_body() {
        let payload = PromptPayload::new("hi").with_system_prompt("be brief");
        let body = serde_json::to_value(wire::ChatRequest::new("gpt-4o", &payload)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_messages_request_body() {
        let payload = PromptPayload::new("hi").with_system_prompt("be brief");
        let body = serde_json::to_value(wire::MessagesRequest::new("claude", &payload)).unwrap();
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_messages_response_text() {
        let body: wire::MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Hello"},{"type":"text","text":" world"}],
                "usage":{"input_tokens":3,"output_tokens":2}}"#,
        )
        .unwrap();
        assert_eq!(body.text(), "Hello world");
        assert_eq!(body.total_tokens(), 5);
    }
