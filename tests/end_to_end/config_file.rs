//! Engine assembled from a configuration file

use duet::core::CONFIG_FILE_NAME;
use duet::{DuetConfig, Engine, EngineError, MemoryTransport, PushTransport};
use std::sync::Arc;

const CONFIG: &str = r#"
[buffer]
capacity = 10

[buffer.topics.bets]
name = "bet-events"
type_tags = ["BET_PLACED"]

[buffer.topics.payments]
name = "payment-events"
capacity = 3
type_tags = ["PAYMENT_DEPOSITED", "PAYMENT_WITHDRAWN"]

[subscription]
stream = "BETTING"
create_attempts = 4

[search]
poll_interval_ms = 25
"#;

#[test]
fn engine_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, CONFIG).unwrap();

    let config = DuetConfig::from_file(&path).unwrap();
    assert_eq!(config.subscription.stream, "BETTING");
    assert_eq!(config.subscription.create_attempts, 4);

    let engine = Engine::builder()
        .config(config)
        .transport(Arc::new(MemoryTransport::new()) as Arc<dyn PushTransport>)
        .build()
        .unwrap();
    assert_eq!(
        engine.buffers().topics(),
        vec!["bet-events".to_string(), "payment-events".to_string()]
    );
    assert_eq!(engine.buffers().get("payment-events").unwrap().capacity(), 3);
    assert_eq!(engine.buffers().get("bet-events").unwrap().capacity(), 10);
    assert_eq!(engine.registry().len(), 7);
}

#[test]
fn default_config_file_is_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    DuetConfig::write_default_if_missing(&path).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(DuetConfig::from_file(&path).unwrap(), DuetConfig::default());

    std::fs::write(&path, CONFIG).unwrap();
    DuetConfig::write_default_if_missing(&path).unwrap();
    assert_ne!(std::fs::read_to_string(&path).unwrap(), written);
}

#[test]
fn invalid_config_is_rejected_at_build() {
    let mut config = DuetConfig::default();
    config.search.poll_interval_ms = 0;
    let err = Engine::builder()
        .config(config)
        .transport(Arc::new(MemoryTransport::new()) as Arc<dyn PushTransport>)
        .build()
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}
