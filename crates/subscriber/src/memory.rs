//! In-process push transport
//!
//! [`MemoryTransport`] keeps every published message in a shared log and
//! replays it to each new subscription (deliver-all), then pushes later
//! publishes as they arrive. It records acks, nacks and subscription
//! lifecycle calls so tests can assert on them, and can be told to fail the
//! next N subscription attempts.

use crate::error::TransportError;
use crate::transport::{Acker, Delivery, PushSubscription, PushTransport, SubscribeOptions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duet_core::TYPE_HEADER;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

/// How a delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Acknowledged
    Ack,
    /// Rejected
    Nack,
}

#[derive(Debug, Clone)]
struct Published {
    subject: String,
    sequence: u64,
    timestamp: DateTime<Utc>,
    headers: HashMap<String, String>,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct Shared {
    log: Mutex<Vec<Published>>,
    settlements: Mutex<Vec<(u64, Settlement)>>,
    notify: Notify,
    closed: AtomicBool,
    fail_next_subscribes: AtomicU32,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
    active: AtomicUsize,
}

/// A [`PushTransport`] backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish raw bytes; returns the assigned stream sequence (1-based)
    pub fn publish(&self, subject: &str, type_tag: Option<&str>, payload: Vec<u8>) -> u64 {
        let mut headers = HashMap::new();
        if let Some(tag) = type_tag {
            headers.insert(TYPE_HEADER.to_string(), tag.to_string());
        }

        let sequence = {
            let mut log = self.shared.log.lock();
            let sequence = log.len() as u64 + 1;
            log.push(Published {
                subject: subject.to_string(),
                sequence,
                timestamp: Utc::now(),
                headers,
                payload,
            });
            sequence
        };
        self.shared.notify.notify_waiters();
        debug!(subject, sequence, "published to memory transport");
        sequence
    }

    /// Publish a value encoded as JSON
    pub fn publish_json<V: Serialize>(
        &self,
        subject: &str,
        type_tag: &str,
        value: &V,
    ) -> Result<u64, TransportError> {
        let payload =
            serde_json::to_vec(value).map_err(|e| TransportError::Protocol(e.to_string()))?;
        Ok(self.publish(subject, Some(type_tag), payload))
    }

    /// Make the next `count` subscribe calls fail
    pub fn fail_next_subscribes(&self, count: u32) {
        self.shared.fail_next_subscribes.store(count, Ordering::Release);
    }

    /// Subscriptions created and not yet torn down
    pub fn active_subscriptions(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Total subscribe calls, failed ones included
    pub fn subscribe_calls(&self) -> usize {
        self.shared.subscribe_calls.load(Ordering::Acquire)
    }

    /// Total unsubscribe calls
    pub fn unsubscribe_calls(&self) -> usize {
        self.shared.unsubscribe_calls.load(Ordering::Acquire)
    }

    /// Sequences acknowledged, in order
    pub fn acked(&self) -> Vec<u64> {
        self.settled(Settlement::Ack)
    }

    /// Sequences rejected, in order
    pub fn nacked(&self) -> Vec<u64> {
        self.settled(Settlement::Nack)
    }

    /// Whether [`close`](PushTransport::close) has been called
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn settled(&self, kind: Settlement) -> Vec<u64> {
        self.shared
            .settlements
            .lock()
            .iter()
            .filter(|(_, k)| *k == kind)
            .map(|(seq, _)| *seq)
            .collect()
    }
}

#[async_trait]
impl PushTransport for MemoryTransport {
    async fn subscribe(
        &self,
        subject: &str,
        _options: &SubscribeOptions,
    ) -> Result<Box<dyn PushSubscription>, TransportError> {
        self.shared.subscribe_calls.fetch_add(1, Ordering::AcqRel);
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let injected = self
            .shared
            .fail_next_subscribes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(TransportError::Subscribe(format!(
                "injected failure for '{subject}'"
            )));
        }

        self.shared.active.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MemorySubscription {
            shared: Arc::clone(&self.shared),
            pattern: subject.to_string(),
            cursor: 0,
            unsubscribed: false,
        }))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

struct MemorySubscription {
    shared: Arc<Shared>,
    pattern: String,
    cursor: usize,
    unsubscribed: bool,
}

impl MemorySubscription {
    fn next_published(&mut self) -> Option<Published> {
        let log = self.shared.log.lock();
        while self.cursor < log.len() {
            let candidate = &log[self.cursor];
            self.cursor += 1;
            if subject_matches(&self.pattern, &candidate.subject) {
                return Some(candidate.clone());
            }
        }
        None
    }
}

#[async_trait]
impl PushSubscription for MemorySubscription {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, TransportError>> {
        let shared = Arc::clone(&self.shared);
        loop {
            // Registered before the log check so a concurrent publish is not missed.
            let notified = shared.notify.notified();
            if self.unsubscribed || shared.closed.load(Ordering::Acquire) {
                return None;
            }
            if let Some(message) = self.next_published() {
                let acker = MemoryAcker {
                    shared: Arc::clone(&shared),
                    sequence: message.sequence,
                };
                let delivery = Delivery::new(message.subject, message.payload, Box::new(acker))
                    .with_sequence(message.sequence)
                    .with_timestamp(message.timestamp)
                    .with_headers(message.headers);
                return Some(Ok(delivery));
            }
            notified.await;
        }
    }

    async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        self.shared.unsubscribe_calls.fetch_add(1, Ordering::AcqRel);
        if !self.unsubscribed {
            self.unsubscribed = true;
            self.shared.active.fetch_sub(1, Ordering::AcqRel);
        }
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

struct MemoryAcker {
    shared: Arc<Shared>,
    sequence: u64,
}

#[async_trait]
impl Acker for MemoryAcker {
    async fn ack(&self) -> Result<(), TransportError> {
        self.shared
            .settlements
            .lock()
            .push((self.sequence, Settlement::Ack));
        Ok(())
    }

    async fn nack(&self) -> Result<(), TransportError> {
        self.shared
            .settlements
            .lock()
            .push((self.sequence, Settlement::Nack));
        Ok(())
    }
}

/// NATS-style subject matching: `*` matches one token, `>` the rest
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');
    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
