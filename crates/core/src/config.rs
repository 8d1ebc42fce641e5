//! Engine configuration via `duet.toml`
//!
//! One file configures both sides: which log-stream topics to buffer and how
//! deep, how push-stream subscriptions are created and retried, and the
//! default search budget. Every field has a default, so an empty file is a
//! valid (if useless, no topics) configuration.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "duet.toml";

/// Default ring buffer capacity per topic
pub const DEFAULT_BUFFER_CAPACITY: usize = 1_000;

/// One buffered log-stream topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicConfig {
    /// Broker topic name
    pub name: String,
    /// Capacity override (0 = unbounded). Falls back to `buffer.capacity`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    /// Event type tags published on this topic
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_tags: Vec<String>,
}

/// Ring buffer settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferConfig {
    /// Default capacity for every topic (0 = unbounded)
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Buffered topics keyed by the name callers search with
    #[serde(default)]
    pub topics: BTreeMap<String, TopicConfig>,
}

fn default_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            topics: BTreeMap::new(),
        }
    }
}

impl BufferConfig {
    /// Effective capacity of a configured topic
    pub fn capacity_for(&self, topic: &TopicConfig) -> usize {
        topic.capacity.unwrap_or(self.capacity)
    }

    /// Broker topic name for a topic key
    pub fn topic_name(&self, key: &str) -> Option<&str> {
        self.topics.get(key).map(|t| t.name.as_str())
    }

    /// Broker topic name carrying a type tag
    pub fn topic_for_type_tag(&self, type_tag: &str) -> Option<&str> {
        self.topics
            .values()
            .find(|t| t.type_tags.iter().any(|tag| tag == type_tag))
            .map(|t| t.name.as_str())
    }

    /// `(topic name, capacity)` for every configured topic
    pub fn resolved_topics(&self) -> Vec<(String, usize)> {
        self.topics
            .values()
            .map(|t| (t.name.clone(), self.capacity_for(t)))
            .collect()
    }
}

/// Push-stream subscription settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionConfig {
    /// Stream the subjects belong to
    #[serde(default = "default_stream")]
    pub stream: String,
    /// How long the broker waits for an ack before redelivering
    #[serde(default = "default_ack_wait_ms")]
    pub ack_wait_ms: u64,
    /// Idle time after which the broker may drop the consumer
    #[serde(default = "default_inactive_threshold_ms")]
    pub inactive_threshold_ms: u64,
    /// Maximum in-flight (unacked) deliveries
    #[serde(default = "default_max_ack_pending")]
    pub max_ack_pending: i64,
    /// Subscription creation attempts
    #[serde(default = "default_create_attempts")]
    pub create_attempts: u32,
    /// Fixed delay between creation attempts
    #[serde(default = "default_create_retry_delay_ms")]
    pub create_retry_delay_ms: u64,
    /// Wall-clock budget for a matching message
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// Header carrying the type tag
    #[serde(default = "default_type_header")]
    pub type_header: String,
}

fn default_stream() -> String {
    "EVENTS".to_string()
}
fn default_ack_wait_ms() -> u64 {
    30_000
}
fn default_inactive_threshold_ms() -> u64 {
    60_000
}
fn default_max_ack_pending() -> i64 {
    1_000
}
fn default_create_attempts() -> u32 {
    3
}
fn default_create_retry_delay_ms() -> u64 {
    1_000
}
fn default_wait_timeout_ms() -> u64 {
    30_000
}
fn default_type_header() -> String {
    crate::types::TYPE_HEADER.to_string()
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            stream: default_stream(),
            ack_wait_ms: default_ack_wait_ms(),
            inactive_threshold_ms: default_inactive_threshold_ms(),
            max_ack_pending: default_max_ack_pending(),
            create_attempts: default_create_attempts(),
            create_retry_delay_ms: default_create_retry_delay_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
            type_header: default_type_header(),
        }
    }
}

impl SubscriptionConfig {
    /// Ack wait as a `Duration`
    pub fn ack_wait(&self) -> Duration {
        Duration::from_millis(self.ack_wait_ms)
    }

    /// Inactivity threshold as a `Duration`
    pub fn inactive_threshold(&self) -> Duration {
        Duration::from_millis(self.inactive_threshold_ms)
    }

    /// Wait budget as a `Duration`
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Retry policy for subscription creation (fixed delay)
    pub fn create_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.create_attempts,
            Duration::from_millis(self.create_retry_delay_ms),
        )
    }
}

/// Log-side search settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Default search budget
    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
    /// Pause between buffer scans
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_search_timeout_ms() -> u64 {
    10_000
}
fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_search_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl SearchConfig {
    /// Search budget as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// NATS connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NatsConfig {
    /// Server URL
    #[serde(default = "default_nats_url")]
    pub url: String,
    /// Connection attempts before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Base backoff between connection attempts
    #[serde(default = "default_connect_retry_delay_ms")]
    pub connect_retry_delay_ms: u64,
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}
fn default_connect_attempts() -> u32 {
    5
}
fn default_connect_retry_delay_ms() -> u64 {
    250
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
            connect_attempts: default_connect_attempts(),
            connect_retry_delay_ms: default_connect_retry_delay_ms(),
        }
    }
}

impl NatsConfig {
    /// Exponential connect backoff
    pub fn connect_retry(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.connect_attempts)
            .with_delay_ms(self.connect_retry_delay_ms)
            .with_max_delay_ms(self.connect_retry_delay_ms.saturating_mul(16))
            .with_exponential_backoff()
    }
}

/// Kafka consumer settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KafkaConfig {
    /// Bootstrap servers
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    /// Consumer group
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Broker poll timeout of the background poller
    #[serde(default = "default_kafka_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Pass-through consumer properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}
fn default_group_id() -> String {
    "duet".to_string()
}
fn default_kafka_poll_timeout_ms() -> u64 {
    200
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            group_id: default_group_id(),
            poll_timeout_ms: default_kafka_poll_timeout_ms(),
            properties: BTreeMap::new(),
        }
    }
}

impl KafkaConfig {
    /// Poll timeout as a `Duration`
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Engine configuration loaded from `duet.toml`
///
/// # Example
///
/// ```toml
/// [buffer]
/// capacity = 500
///
/// [buffer.topics.bets]
/// name = "bets.v1"
/// type_tags = ["BET_PLACED", "BET_SETTLED"]
///
/// [subscription]
/// stream = "EVENTS"
/// create_attempts = 3
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DuetConfig {
    /// Ring buffers
    #[serde(default)]
    pub buffer: BufferConfig,
    /// Push-stream subscriptions
    #[serde(default)]
    pub subscription: SubscriptionConfig,
    /// Log-side search
    #[serde(default)]
    pub search: SearchConfig,
    /// NATS connection
    #[serde(default)]
    pub nats: NatsConfig,
    /// Kafka consumer
    #[serde(default)]
    pub kafka: KafkaConfig,
}

impl DuetConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DuetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for (key, topic) in &self.buffer.topics {
            if topic.name.trim().is_empty() {
                return Err(Error::invalid_config(format!(
                    "topic '{}' has an empty name",
                    key
                )));
            }
            if !seen.insert(topic.name.as_str()) {
                return Err(Error::invalid_config(format!(
                    "topic name '{}' is configured twice",
                    topic.name
                )));
            }
        }
        if self.subscription.stream.trim().is_empty() {
            return Err(Error::invalid_config("subscription.stream is empty"));
        }
        if self.subscription.max_ack_pending <= 0 {
            return Err(Error::invalid_config(
                "subscription.max_ack_pending must be positive",
            ));
        }
        if self.subscription.create_attempts == 0 {
            return Err(Error::invalid_config(
                "subscription.create_attempts must be at least 1",
            ));
        }
        if self.search.poll_interval_ms == 0 {
            return Err(Error::invalid_config(
                "search.poll_interval_ms must be positive",
            ));
        }
        Ok(())
    }

    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# duet configuration

[buffer]
# Messages kept per topic; 0 keeps everything.
capacity = 1000

# One table per buffered log-stream topic. The table key is the name
# searches refer to; `type_tags` routes sequence lookups to the topic.
# [buffer.topics.bets]
# name = "bets.v1"
# capacity = 200
# type_tags = ["BET_PLACED", "BET_SETTLED", "BET_CANCELLED"]

[subscription]
stream = "EVENTS"
ack_wait_ms = 30000
inactive_threshold_ms = 60000
max_ack_pending = 1000
create_attempts = 3
create_retry_delay_ms = 1000
wait_timeout_ms = 30000
type_header = "type"

[search]
timeout_ms = 10000
poll_interval_ms = 100

[nats]
url = "nats://localhost:4222"
connect_attempts = 5
connect_retry_delay_ms = 250

[kafka]
bootstrap_servers = "localhost:9092"
group_id = "duet"
poll_timeout_ms = 200
"#
    }

    /// Write the default config file if it does not already exist
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::invalid_config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_toml_parses_to_default() {
        let parsed = DuetConfig::from_toml_str(DuetConfig::default_toml()).unwrap();
        assert_eq!(parsed, DuetConfig::default());
    }

    #[test]
    fn test_empty_document_is_valid() {
        let config = DuetConfig::from_toml_str("").unwrap();
        assert!(config.buffer.topics.is_empty());
        assert_eq!(config.buffer.capacity, DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn test_topics_and_overrides() {
        let config = DuetConfig::from_toml_str(
            r#"
            [buffer]
            capacity = 50

            [buffer.topics.bets]
            name = "bets.v1"
            capacity = 5
            type_tags = ["BET_PLACED"]

            [buffer.topics.wallet]
            name = "wallet.v1"
            "#,
        )
        .unwrap();

        let bets = &config.buffer.topics["bets"];
        assert_eq!(config.buffer.capacity_for(bets), 5);
        let wallet = &config.buffer.topics["wallet"];
        assert_eq!(config.buffer.capacity_for(wallet), 50);
        assert_eq!(config.buffer.topic_name("bets"), Some("bets.v1"));
        assert_eq!(config.buffer.topic_for_type_tag("BET_PLACED"), Some("bets.v1"));
        assert_eq!(config.buffer.topic_for_type_tag("UNKNOWN"), None);
    }

    #[test]
    fn test_duplicate_topic_name_rejected() {
        let err = DuetConfig::from_toml_str(
            r#"
            [buffer.topics.a]
            name = "same"
            [buffer.topics.b]
            name = "same"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = DuetConfig::from_toml_str("[subscription]\ncreate_attempts = 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_subscription_durations() {
        let sub = SubscriptionConfig {
            ack_wait_ms: 1500,
            create_attempts: 4,
            create_retry_delay_ms: 10,
            ..Default::default()
        };
        assert_eq!(sub.ack_wait(), Duration::from_millis(1500));
        let retry = sub.create_retry();
        assert_eq!(retry.attempts(), 4);
        assert_eq!(retry.delay_after(3), Duration::from_millis(10));
    }

    #[test]
    fn test_from_file_and_write_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        DuetConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        std::fs::write(&path, "[search]\npoll_interval_ms = 5\n").unwrap();
        DuetConfig::write_default_if_missing(&path).unwrap();
        let config = DuetConfig::from_file(&path).unwrap();
        assert_eq!(config.search.poll_interval(), Duration::from_millis(5));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = TempDir::new().unwrap();
        let err = DuetConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
