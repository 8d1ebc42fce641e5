//! Push transport abstraction
//!
//! The correlator talks to the push stream only through these traits:
//!
//! - [`PushTransport`] creates subscriptions and closes the connection
//! - [`PushSubscription`] yields [`Delivery`] values and tears itself down
//! - [`Acker`] settles one delivery
//!
//! Implementations: [`MemoryTransport`](crate::MemoryTransport) for tests and
//! `NatsTransport` (feature `nats`) for JetStream.

use crate::error::TransportError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duet_core::{SubscriptionConfig, TYPE_HEADER};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Subscription options
// ============================================================================

/// How a push subscription is created
///
/// Subscriptions are always push-based, explicit-ack and deliver-all; these
/// knobs bound how long the broker waits for acks and how many may be pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Stream the subject belongs to
    pub stream: String,
    /// Redelivery timer for unacked messages
    pub ack_wait: Duration,
    /// Idle time after which the broker may drop the consumer
    pub inactive_threshold: Duration,
    /// In-flight buffer size
    pub max_ack_pending: i64,
    /// Header carrying the type tag
    pub type_header: String,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self::from(&SubscriptionConfig::default())
    }
}

impl From<&SubscriptionConfig> for SubscribeOptions {
    fn from(config: &SubscriptionConfig) -> Self {
        Self {
            stream: config.stream.clone(),
            ack_wait: config.ack_wait(),
            inactive_threshold: config.inactive_threshold(),
            max_ack_pending: config.max_ack_pending,
            type_header: config.type_header.clone(),
        }
    }
}

// ============================================================================
// Deliveries
// ============================================================================

/// Settles a single delivery with the broker
#[async_trait]
pub trait Acker: Send + Sync {
    /// Positive acknowledgement
    async fn ack(&self) -> Result<(), TransportError>;

    /// Negative acknowledgement; the broker may redeliver
    async fn nack(&self) -> Result<(), TransportError>;
}

/// One message pushed by the broker
pub struct Delivery {
    /// Subject the message was published on
    pub subject: String,
    /// Stream sequence, if the broker supplied metadata
    pub sequence: Option<u64>,
    /// Publish time, if known
    pub timestamp: Option<DateTime<Utc>>,
    /// Message headers
    pub headers: HashMap<String, String>,
    /// Raw payload bytes
    pub payload: Vec<u8>,
    acker: Box<dyn Acker>,
}

impl Delivery {
    /// Create a delivery settled through `acker`
    pub fn new(subject: impl Into<String>, payload: Vec<u8>, acker: Box<dyn Acker>) -> Self {
        Self {
            subject: subject.into(),
            sequence: None,
            timestamp: None,
            headers: HashMap::new(),
            payload,
            acker,
        }
    }

    /// Set the stream sequence (builder pattern)
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Set the publish time (builder pattern)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Replace all headers (builder pattern)
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Look up a header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The type tag under the default header name
    pub fn type_tag(&self) -> Option<&str> {
        self.header(TYPE_HEADER)
    }

    /// Acknowledge this delivery
    pub async fn ack(&self) -> Result<(), TransportError> {
        self.acker.ack().await
    }

    /// Reject this delivery
    pub async fn nack(&self) -> Result<(), TransportError> {
        self.acker.nack().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("subject", &self.subject)
            .field("sequence", &self.sequence)
            .field("timestamp", &self.timestamp)
            .field("headers", &self.headers)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

// ============================================================================
// Transport traits
// ============================================================================

/// A live push subscription
#[async_trait]
pub trait PushSubscription: Send {
    /// Next delivery; `None` once the broker ends the subscription
    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>>;

    /// Tear the subscription down
    ///
    /// Returns [`TransportError::Closed`] when the connection is already gone.
    async fn unsubscribe(&mut self) -> Result<(), TransportError>;
}

/// A connection to the push broker
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Create a subscription on `subject`
    ///
    /// A failed call must leave nothing behind on the broker.
    async fn subscribe(
        &self,
        subject: &str,
        options: &SubscribeOptions,
    ) -> Result<Box<dyn PushSubscription>, TransportError>;

    /// Drain and close the connection
    async fn close(&self) -> Result<(), TransportError>;
}
