//! Kafka log source
//!
//! [`KafkaLogSource`] consumes the buffered topics with an rdkafka
//! `BaseConsumer` and turns each record into a [`RawMessage`]:
//!
//! - `sequence` comes from the `sequence` header, falling back to the offset
//! - `type_tag` comes from the `type` header
//! - the record key and all headers are preserved for correlation
//!
//! Offsets are auto-committed; the buffers are the only state kept.

use crate::poller::{LogSource, PollerError};
use chrono::{DateTime, Utc};
use duet_core::{KafkaConfig, RawMessage, SEQUENCE_HEADER, TYPE_HEADER};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on records returned by one poll
const MAX_BATCH: usize = 500;

/// Log source reading from Kafka
pub struct KafkaLogSource {
    consumer: BaseConsumer,
}

impl KafkaLogSource {
    /// Create a consumer from configuration
    pub fn new(config: &KafkaConfig) -> Result<Self, PollerError> {
        info!(
            brokers = %config.bootstrap_servers,
            group_id = %config.group_id,
            "creating Kafka log source"
        );
        let consumer: BaseConsumer = to_rdkafka_config(config)
            .create()
            .map_err(|e| PollerError::Connect(format!("failed to create consumer: {e}")))?;
        Ok(Self { consumer })
    }
}

fn to_rdkafka_config(config: &KafkaConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client.set("bootstrap.servers", &config.bootstrap_servers);
    client.set("group.id", &config.group_id);
    client.set("enable.auto.commit", "true");
    client.set("auto.offset.reset", "latest");

    // Pass-through properties can override defaults.
    for (key, value) in &config.properties {
        client.set(key, value);
    }
    client
}

impl LogSource for KafkaLogSource {
    fn subscribe(&mut self, topics: &[String]) -> Result<(), PollerError> {
        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer
            .subscribe(&topics)
            .map_err(|e| PollerError::Connect(format!("failed to subscribe: {e}")))
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, PollerError> {
        let mut batch = Vec::new();
        let mut wait = timeout;
        while batch.len() < MAX_BATCH {
            match self.consumer.poll(wait) {
                None => break,
                Some(Ok(record)) => batch.push(to_raw_message(&record)),
                Some(Err(e)) if batch.is_empty() => {
                    return Err(PollerError::Poll(e.to_string()));
                }
                Some(Err(e)) => {
                    // Keep what we have; the error resurfaces on the next poll.
                    warn!(error = %e, "Kafka consumer error mid-batch");
                    break;
                }
            }
            // Drain whatever is already fetched without waiting again.
            wait = Duration::ZERO;
        }
        Ok(batch)
    }

    fn close(&mut self) {
        self.consumer.unsubscribe();
        info!("Kafka log source closed");
    }
}

fn to_raw_message(record: &BorrowedMessage<'_>) -> RawMessage {
    let mut headers = HashMap::new();
    if let Some(record_headers) = record.headers() {
        for header in record_headers.iter() {
            if let Some(value) = header.value.and_then(|v| std::str::from_utf8(v).ok()) {
                headers.insert(header.key.to_string(), value.to_string());
            }
        }
    }

    let sequence = headers
        .get(SEQUENCE_HEADER)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(record.offset().max(0) as u64);
    let type_tag = headers.get(TYPE_HEADER).cloned().unwrap_or_default();
    let timestamp = record
        .timestamp()
        .to_millis()
        .and_then(DateTime::<Utc>::from_timestamp_millis);

    RawMessage {
        topic: record.topic().to_string(),
        sequence,
        type_tag,
        timestamp,
        key: record.key().map(<[u8]>::to_vec),
        headers,
        payload: record.payload().map(<[u8]>::to_vec).unwrap_or_default(),
    }
}
