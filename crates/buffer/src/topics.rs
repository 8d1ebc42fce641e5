//! The fixed set of buffered topics
//!
//! [`TopicBuffers`] is built once at startup from configuration. The topic
//! map itself never changes afterwards, so lookups take no lock; only the
//! individual buffers synchronize.

use crate::ring::{BufferSnapshot, TopicBuffer};
use duet_core::{BufferConfig, RawMessage};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ring buffers for every configured topic
#[derive(Debug, Default)]
pub struct TopicBuffers {
    buffers: FxHashMap<String, Arc<TopicBuffer>>,
}

impl TopicBuffers {
    /// Create buffers from `(topic, capacity)` pairs
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let buffers = topics
            .into_iter()
            .map(|(topic, capacity)| {
                let topic = topic.into();
                let buffer = Arc::new(TopicBuffer::new(topic.clone(), capacity));
                (topic, buffer)
            })
            .collect();
        Self { buffers }
    }

    /// Create buffers for every topic in the config
    pub fn from_config(config: &BufferConfig) -> Self {
        Self::new(config.resolved_topics())
    }

    /// Append a message to its topic's buffer
    ///
    /// Unconfigured topics are ignored with a warning. Returns whether the
    /// message was buffered.
    pub fn push(&self, topic: &str, message: RawMessage) -> bool {
        match self.buffers.get(topic) {
            Some(buffer) => {
                let evicted = buffer.push(message);
                if evicted > 0 {
                    debug!(topic, evicted, "ring buffer full, evicted oldest");
                }
                true
            }
            None => {
                warn!(
                    topic,
                    sequence = message.sequence,
                    "dropping message for unconfigured topic"
                );
                false
            }
        }
    }

    /// Buffer for a topic
    pub fn get(&self, topic: &str) -> Option<&Arc<TopicBuffer>> {
        self.buffers.get(topic)
    }

    /// Snapshot of a topic's buffer, `None` if the topic is not configured
    pub fn snapshot(&self, topic: &str) -> Option<BufferSnapshot> {
        self.buffers.get(topic).map(|b| b.snapshot())
    }

    /// Whether a topic is configured
    pub fn contains(&self, topic: &str) -> bool {
        self.buffers.contains_key(topic)
    }

    /// Empty one topic's buffer; returns whether the topic exists
    pub fn clear(&self, topic: &str) -> bool {
        match self.buffers.get(topic) {
            Some(buffer) => {
                buffer.clear();
                true
            }
            None => false,
        }
    }

    /// Empty every buffer
    pub fn clear_all(&self) {
        for buffer in self.buffers.values() {
            buffer.clear();
        }
    }

    /// Configured topic names, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.buffers.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Number of configured topics
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no topics are configured
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_core::DuetConfig;

    #[test]
    fn test_push_to_unconfigured_topic_is_noop() {
        let buffers = TopicBuffers::new([("bets", 10)]);
        assert!(!buffers.push("wallet", RawMessage::new("wallet", 1, "X", b"{}".to_vec())));
        assert!(buffers.snapshot("wallet").is_none());
        assert!(buffers.push("bets", RawMessage::new("bets", 1, "X", b"{}".to_vec())));
        assert_eq!(buffers.get("bets").unwrap().len(), 1);
    }

    #[test]
    fn test_clear_single_and_all() {
        let buffers = TopicBuffers::new([("a", 0), ("b", 0)]);
        buffers.push("a", RawMessage::new("a", 1, "X", b"{}".to_vec()));
        buffers.push("b", RawMessage::new("b", 1, "X", b"{}".to_vec()));

        assert!(buffers.clear("a"));
        assert!(!buffers.clear("missing"));
        assert!(buffers.get("a").unwrap().is_empty());
        assert_eq!(buffers.get("b").unwrap().len(), 1);

        buffers.clear_all();
        assert!(buffers.get("b").unwrap().is_empty());
        assert_eq!(buffers.len(), 2);
    }

    #[test]
    fn test_from_config_applies_capacities() {
        let config = DuetConfig::from_toml_str(
            r#"
            [buffer]
            capacity = 7
            [buffer.topics.bets]
            name = "bets.v1"
            capacity = 2
            [buffer.topics.wallet]
            name = "wallet.v1"
            "#,
        )
        .unwrap();
        let buffers = TopicBuffers::from_config(&config.buffer);
        assert_eq!(buffers.topics(), vec!["bets.v1", "wallet.v1"]);
        assert_eq!(buffers.get("bets.v1").unwrap().capacity(), 2);
        assert_eq!(buffers.get("wallet.v1").unwrap().capacity(), 7);
    }
}
