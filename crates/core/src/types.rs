//! Core data types
//!
//! - [`RawMessage`]: an undecoded envelope from either stream
//! - [`CorrelationResult`]: a decoded payload plus where it came from
//! - [`CorrelationKeys`]: the pair of UUIDs tying a push subject to a log record
//! - [`LogRecord`]: the log-side view handed to the cross-stream correlator

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Header carrying the event type tag
pub const TYPE_HEADER: &str = "type";
/// Header carrying the originating stream sequence on the log side
pub const SEQUENCE_HEADER: &str = "sequence";
/// Header carrying `<uuid>:<uuid>` correlation keys on the log side
pub const CORRELATION_KEYS_HEADER: &str = "correlation-keys";

/// An opaque envelope received from the push stream or the log stream
///
/// Immutable once received. Buffers share it as `Arc<RawMessage>`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Topic (log stream) or subject (push stream)
    pub topic: String,
    /// Monotonic sequence, meaningful only within one stream
    pub sequence: u64,
    /// Event kind
    pub type_tag: String,
    /// Broker timestamp, if the transport provides one
    pub timestamp: Option<DateTime<Utc>>,
    /// Record key (log stream only)
    pub key: Option<Vec<u8>>,
    /// Transport headers
    pub headers: HashMap<String, String>,
    /// Broker-native payload bytes
    pub payload: Vec<u8>,
}

impl RawMessage {
    /// Create a message with no key, headers or timestamp
    pub fn new(
        topic: impl Into<String>,
        sequence: u64,
        type_tag: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            sequence,
            type_tag: type_tag.into(),
            timestamp: None,
            key: None,
            headers: HashMap::new(),
            payload: payload.into(),
        }
    }

    /// Set the record key (builder pattern)
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set a header (builder pattern)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the timestamp (builder pattern)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Look up a header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Deserialize the payload as JSON into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.payload)
    }
}

/// A decoded payload with its origin
///
/// Produced by both the subscription correlator (push side) and the
/// predicate search (log side). Terminal once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationResult<T> {
    /// Decoded domain object
    pub payload: T,
    /// Subject or topic the message arrived on
    pub subject: String,
    /// Event kind
    pub type_tag: String,
    /// Stream sequence
    pub sequence: u64,
    /// Broker timestamp, if known
    pub timestamp: Option<DateTime<Utc>>,
}

impl<T> CorrelationResult<T> {
    /// Drop the envelope, keeping only the payload
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Transform the payload, keeping the envelope
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CorrelationResult<U> {
        CorrelationResult {
            payload: f(self.payload),
            subject: self.subject,
            type_tag: self.type_tag,
            sequence: self.sequence,
            timestamp: self.timestamp,
        }
    }
}

/// The two correlation keys shared by a push subject and a log record
///
/// Push subjects embed them as path tokens, e.g.
/// `bets.<account uuid>.<bet uuid>.placed`; log records carry them as a
/// `<uuid>:<uuid>` record key or header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationKeys {
    /// First key (usually the owning account)
    pub primary: Uuid,
    /// Second key (usually the entity)
    pub secondary: Uuid,
}

impl CorrelationKeys {
    /// Create a key pair
    pub fn new(primary: Uuid, secondary: Uuid) -> Self {
        Self { primary, secondary }
    }

    /// Extract the first two UUID-shaped tokens of a dot-separated subject
    pub fn from_subject(subject: &str) -> Option<Self> {
        let mut uuids = subject
            .split('.')
            .filter_map(|token| Uuid::parse_str(token).ok());
        let primary = uuids.next()?;
        let secondary = uuids.next()?;
        Some(Self { primary, secondary })
    }

    /// Parse the `<uuid>:<uuid>` form
    pub fn parse_pair(text: &str) -> Option<Self> {
        let (a, b) = text.trim().split_once(':')?;
        Some(Self {
            primary: Uuid::parse_str(a).ok()?,
            secondary: Uuid::parse_str(b).ok()?,
        })
    }

    /// Keys declared by a log-side message: record key first, then header
    pub fn from_message(message: &RawMessage) -> Option<Self> {
        message
            .key
            .as_deref()
            .and_then(|k| std::str::from_utf8(k).ok())
            .and_then(Self::parse_pair)
            .or_else(|| {
                message
                    .header(CORRELATION_KEYS_HEADER)
                    .and_then(Self::parse_pair)
            })
    }
}

impl fmt::Display for CorrelationKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.primary, self.secondary)
    }
}

/// A log-stream record as seen by the cross-stream correlator
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Originating sequence
    pub sequence: u64,
    /// Event kind
    pub type_tag: String,
    /// Declared correlation keys, if the record carries any
    pub keys: Option<CorrelationKeys>,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// Build a record from a buffered log-stream message
    pub fn from_message(message: &RawMessage) -> Self {
        Self {
            sequence: message.sequence,
            type_tag: message.type_tag.clone(),
            keys: CorrelationKeys::from_message(message),
            payload: message.payload.clone(),
        }
    }
}
