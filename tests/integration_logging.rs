use yt_nope::config::{Config, LoggingConfig};

#[tokio::test]
async fn test_logging_config_instantiation() {
    let config = LoggingConfig {
        enable: true,
        format: "json".to_string(),
        level: "info".to_string(),
        action_log_sinks: vec!["console".to_string(), "memory".to_string()],
        memory_capacity: 2,
    };

    use yt_nope::logger::{ActionLogEntry, ActionLogger, ActionOutcome};
    let logger = ActionLogger::new(config, vec![]);

    for channel in ["one", "two", "three"] {
        logger.log(ActionLogEntry {
            channel: channel.to_string(),
            matched: channel.to_string(),
            action: ActionOutcome::Suppressed,
            hidden: false,
            latency_ms: 0,
        });
    }

    // Allow time for async task to process
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let recent: Vec<String> = logger.recent().into_iter().map(|e| e.channel).collect();
    assert_eq!(recent, vec!["two", "three"]);
}

#[test]
fn test_logging_section_from_toml() {
    let config = Config::from_toml(
        r#"
        [logging]
        format = "json"
        action_log_sinks = ["memory"]
        "#,
    )
    .unwrap();
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.memory_capacity, 100);
}
