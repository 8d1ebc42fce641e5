//! Log record lookup by sequence
//!
//! [`BufferedLookup`] answers "which log record carries this sequence and
//! type tag" from the ring buffers, polling until the record arrives or the
//! search timeout elapses. The topic is chosen from the type tag using the
//! `type_tags` of each configured topic.

use duet_buffer::Finder;
use duet_core::{DuetConfig, LogRecord};
use rustc_hash::FxHashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of log-side records for the cross-stream correlator
pub trait LogRecordLookup: Send + Sync {
    /// The record with `sequence` and `type_tag`, if it can be found
    fn lookup(&self, sequence: u64, type_tag: &str) -> Option<LogRecord>;
}

/// [`LogRecordLookup`] over the topic ring buffers
#[derive(Debug, Clone)]
pub struct BufferedLookup {
    finder: Finder,
    routes: FxHashMap<String, String>,
    timeout: Duration,
    poll_interval: Duration,
}

impl BufferedLookup {
    /// Create a lookup with no routes
    pub fn new(finder: Finder, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            finder,
            routes: FxHashMap::default(),
            timeout,
            poll_interval,
        }
    }

    /// Create a lookup routed by the configured topics' type tags
    pub fn from_config(finder: Finder, config: &DuetConfig) -> Self {
        let mut lookup = Self::new(
            finder,
            config.search.timeout(),
            config.search.poll_interval(),
        );
        for topic in config.buffer.topics.values() {
            for tag in &topic.type_tags {
                lookup = lookup.with_route(tag.as_str(), topic.name.as_str());
            }
        }
        lookup
    }

    /// Route `type_tag` to `topic` (builder pattern)
    pub fn with_route(mut self, type_tag: impl Into<String>, topic: impl Into<String>) -> Self {
        self.routes.insert(type_tag.into(), topic.into());
        self
    }

    /// Topic holding records of `type_tag`
    pub fn topic_for(&self, type_tag: &str) -> Option<&str> {
        self.routes.get(type_tag).map(String::as_str)
    }
}

impl LogRecordLookup for BufferedLookup {
    fn lookup(&self, sequence: u64, type_tag: &str) -> Option<LogRecord> {
        let Some(topic) = self.topic_for(type_tag) else {
            warn!(type_tag, "no log topic configured for type tag");
            return None;
        };

        let found = self.finder.find_raw(
            topic,
            |message| message.sequence == sequence && message.type_tag == type_tag,
            self.timeout,
            self.poll_interval,
        );
        match found {
            Some(message) => Some(LogRecord::from_message(&message)),
            None => {
                debug!(topic, sequence, type_tag, "log record not found");
                None
            }
        }
    }
}
