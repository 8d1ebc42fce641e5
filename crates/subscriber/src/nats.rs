//! NATS JetStream push transport
//!
//! Each subscription is a fresh durable push consumer on the configured
//! stream: explicit ack, deliver-all, filtered to the requested subject and
//! delivered to a private inbox. Tearing down the subscription deletes the
//! consumer.

use crate::error::TransportError;
use crate::transport::{Acker, Delivery, PushSubscription, PushTransport, SubscribeOptions};
use async_nats::connection::State;
use async_nats::jetstream::{self, consumer, AckKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duet_core::NatsConfig;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// [`PushTransport`] over a NATS JetStream connection
#[derive(Debug, Clone)]
pub struct NatsTransport {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsTransport {
    /// Connect with bounded retry and backoff
    pub async fn connect(config: &NatsConfig) -> Result<Self, TransportError> {
        let policy = config.connect_retry();
        let max_attempts = policy.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match async_nats::connect(config.url.as_str()).await {
                Ok(client) => {
                    info!(url = %config.url, attempt, "connected to NATS");
                    let jetstream = jetstream::new(client.clone());
                    return Ok(Self { client, jetstream });
                }
                Err(e) if attempt < max_attempts => {
                    let delay = policy.delay_after(attempt);
                    warn!(
                        url = %config.url,
                        attempt,
                        max_attempts,
                        error = %e,
                        "NATS connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(TransportError::Connect(format!(
                        "{} after {attempt} attempts: {e}",
                        config.url
                    )));
                }
            }
        }
    }

    fn is_disconnected(&self) -> bool {
        matches!(self.client.connection_state(), State::Disconnected)
    }
}

#[async_trait]
impl PushTransport for NatsTransport {
    async fn subscribe(
        &self,
        subject: &str,
        options: &SubscribeOptions,
    ) -> Result<Box<dyn PushSubscription>, TransportError> {
        let stream = self
            .jetstream
            .get_stream(&options.stream)
            .await
            .map_err(|e| TransportError::Subscribe(format!("stream '{}': {e}", options.stream)))?;

        let name = format!("duet-{}", Uuid::new_v4().simple());
        let config = consumer::push::Config {
            durable_name: Some(name.clone()),
            deliver_subject: self.client.new_inbox(),
            filter_subject: subject.to_string(),
            ack_policy: consumer::AckPolicy::Explicit,
            deliver_policy: consumer::DeliverPolicy::All,
            ack_wait: options.ack_wait,
            inactive_threshold: options.inactive_threshold,
            max_ack_pending: options.max_ack_pending,
            ..Default::default()
        };

        let consumer = stream
            .create_consumer(config)
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        let messages = match consumer.messages().await {
            Ok(messages) => messages,
            Err(e) => {
                // Do not leave a half-created consumer behind on the server.
                if let Err(cleanup) = stream.delete_consumer(&name).await {
                    warn!(consumer = %name, error = %cleanup, "failed to remove consumer");
                }
                return Err(TransportError::Subscribe(e.to_string()));
            }
        };

        debug!(subject, consumer = %name, stream = %options.stream, "created push consumer");
        Ok(Box::new(NatsSubscription {
            transport: self.clone(),
            stream,
            name,
            type_header: options.type_header.clone(),
            messages,
        }))
    }

    /// Flush pending acks and publishes to the server
    ///
    /// Consumers are not drained here. Every wait task deletes its own
    /// consumer when it tears down, and a teardown that finds the connection
    /// gone counts as unsubscribed. Anything left over is removed by the
    /// server once `inactive_threshold` passes.
    async fn close(&self) -> Result<(), TransportError> {
        if self.is_disconnected() {
            return Err(TransportError::Closed);
        }
        self.client
            .flush()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        info!("NATS transport flushed");
        Ok(())
    }
}

struct NatsSubscription {
    transport: NatsTransport,
    stream: jetstream::stream::Stream,
    name: String,
    type_header: String,
    messages: consumer::push::Messages,
}

#[async_trait]
impl PushSubscription for NatsSubscription {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>> {
        let message = match self.messages.next().await? {
            Ok(message) => message,
            Err(e) => return Some(Err(TransportError::Protocol(e.to_string()))),
        };

        let mut headers = HashMap::new();
        if let Some(map) = message.headers.as_ref() {
            for (name, values) in map.iter() {
                if let Some(value) = values.first() {
                    headers.insert(name.to_string(), value.to_string());
                }
            }
        }
        if !headers.contains_key(&self.type_header) {
            debug!(consumer = %self.name, "delivery without type header");
        }

        let (sequence, timestamp) = match message.info() {
            Ok(info) => (
                Some(info.stream_sequence),
                DateTime::<Utc>::from_timestamp(
                    info.published.unix_timestamp(),
                    info.published.nanosecond(),
                ),
            ),
            Err(e) => {
                warn!(consumer = %self.name, error = %e, "delivery without JetStream metadata");
                (None, None)
            }
        };

        let subject = message.subject.to_string();
        let payload = message.payload.to_vec();
        let mut delivery = Delivery::new(subject, payload, Box::new(NatsAcker { message }))
            .with_headers(headers);
        delivery.sequence = sequence;
        delivery.timestamp = timestamp;
        Some(Ok(delivery))
    }

    async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        if self.transport.is_disconnected() {
            return Err(TransportError::Closed);
        }
        self.stream
            .delete_consumer(&self.name)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Subscribe(format!("delete consumer {}: {e}", self.name)))
    }
}

struct NatsAcker {
    message: jetstream::Message,
}

#[async_trait]
impl Acker for NatsAcker {
    async fn ack(&self) -> Result<(), TransportError> {
        self.message
            .ack()
            .await
            .map_err(|e| TransportError::Ack(e.to_string()))
    }

    async fn nack(&self) -> Result<(), TransportError> {
        self.message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| TransportError::Ack(e.to_string()))
    }
}
