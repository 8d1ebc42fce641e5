//! Single-shot subscription correlator
//!
//! [`SubscriptionCorrelator::find_async`] subscribes to a push subject, waits
//! for the first message whose decoded payload satisfies a filter, acks it and
//! tears the subscription down again. Each call runs through:
//!
//! ```text
//! Idle -> Subscribing -> Waiting -> { Matched | TimedOut | Failed } -> Unsubscribed
//! ```
//!
//! The wait runs on a spawned Tokio task. The caller holds a [`PendingMatch`],
//! a future over a single-writer completion slot. Dropping it does not cancel
//! the task: the task still runs to match or timeout and unsubscribes.

use crate::error::{CorrelationError, TransportError};
use crate::slot::CompletionSlot;
use crate::transport::{Delivery, PushSubscription, PushTransport, SubscribeOptions};
use duet_core::{CorrelationResult, RetryPolicy, SubscriptionConfig};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Result delivered by a [`PendingMatch`]
pub type MatchResult<T> = Result<CorrelationResult<T>, CorrelationError>;

// ============================================================================
// State and settings
// ============================================================================

/// Lifecycle of one `find_async` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelatorState {
    /// Task spawned, nothing attempted yet
    Idle,
    /// Creating the subscription
    Subscribing,
    /// Subscribed, evaluating deliveries
    Waiting,
    /// A delivery matched and was acked
    Matched,
    /// The wait budget elapsed
    TimedOut,
    /// Subscription could not be created or ended early
    Failed,
    /// Subscription torn down; terminal
    Unsubscribed,
}

impl CorrelatorState {
    /// Whether the task has reached a terminal outcome
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            CorrelatorState::Matched
                | CorrelatorState::TimedOut
                | CorrelatorState::Failed
                | CorrelatorState::Unsubscribed
        )
    }
}

/// Tunables for a [`SubscriptionCorrelator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatorSettings {
    /// Subscription shape
    pub options: SubscribeOptions,
    /// Retry policy for subscription creation
    pub create_retry: RetryPolicy,
    /// Default wall-clock budget for one wait
    pub wait_timeout: Duration,
}

impl CorrelatorSettings {
    /// Override the wait budget (builder pattern)
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Override the creation retry policy (builder pattern)
    pub fn with_create_retry(mut self, create_retry: RetryPolicy) -> Self {
        self.create_retry = create_retry;
        self
    }
}

impl Default for CorrelatorSettings {
    fn default() -> Self {
        Self::from(&SubscriptionConfig::default())
    }
}

impl From<&SubscriptionConfig> for CorrelatorSettings {
    fn from(config: &SubscriptionConfig) -> Self {
        Self {
            options: SubscribeOptions::from(config),
            create_retry: config.create_retry(),
            wait_timeout: config.wait_timeout(),
        }
    }
}

// ============================================================================
// Correlator
// ============================================================================

/// Finds the first push message satisfying a predicate
#[derive(Clone)]
pub struct SubscriptionCorrelator {
    transport: Arc<dyn PushTransport>,
    settings: CorrelatorSettings,
}

impl SubscriptionCorrelator {
    /// Create a correlator over `transport`
    pub fn new(transport: Arc<dyn PushTransport>, settings: CorrelatorSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Correlator settings
    pub fn settings(&self) -> &CorrelatorSettings {
        &self.settings
    }

    /// Underlying transport
    pub fn transport(&self) -> &Arc<dyn PushTransport> {
        &self.transport
    }

    /// Wait for the first message on `subject` accepted by `filter`
    ///
    /// `filter` receives the decoded payload and the type tag header, if any.
    /// Uses the configured wait timeout.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn find_async<T, F>(&self, subject: &str, filter: F) -> PendingMatch<T>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(&T, Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.find_async_with_timeout(subject, filter, self.settings.wait_timeout)
    }

    /// Like [`find_async`](Self::find_async) with an explicit wait budget
    pub fn find_async_with_timeout<T, F>(
        &self,
        subject: &str,
        filter: F,
        wait_timeout: Duration,
    ) -> PendingMatch<T>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(&T, Option<&str>) -> bool + Send + Sync + 'static,
    {
        let (slot, rx) = CompletionSlot::new();
        let (state_tx, state_rx) = watch::channel(CorrelatorState::Idle);
        let attempts = Arc::new(AtomicU32::new(0));

        let task = WaitTask {
            transport: Arc::clone(&self.transport),
            options: self.settings.options.clone(),
            create_retry: self.settings.create_retry.clone(),
            wait_timeout,
            subject: subject.to_string(),
            filter,
            slot,
            state: state_tx,
            attempts: Arc::clone(&attempts),
        };
        tokio::spawn(task.run());

        PendingMatch {
            subject: subject.to_string(),
            rx,
            attempts,
            state: state_rx,
        }
    }
}

impl std::fmt::Debug for SubscriptionCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionCorrelator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Pending match
// ============================================================================

/// Future resolving to the outcome of one `find_async` call
#[must_use = "the correlation result is only observable by awaiting the PendingMatch"]
#[derive(Debug)]
pub struct PendingMatch<T> {
    subject: String,
    rx: oneshot::Receiver<MatchResult<T>>,
    attempts: Arc<AtomicU32>,
    state: watch::Receiver<CorrelatorState>,
}

impl<T> PendingMatch<T> {
    /// Subject being watched
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Subscription attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> CorrelatorState {
        *self.state.borrow()
    }

    /// A receiver that follows the lifecycle, usable after the future is consumed
    pub fn state_watch(&self) -> watch::Receiver<CorrelatorState> {
        self.state.clone()
    }
}

impl<T> Future for PendingMatch<T> {
    type Output = MatchResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CorrelationError::Cancelled {
                subject: this.subject.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ============================================================================
// Wait task
// ============================================================================

struct WaitTask<T, F> {
    transport: Arc<dyn PushTransport>,
    options: SubscribeOptions,
    create_retry: RetryPolicy,
    wait_timeout: Duration,
    subject: String,
    filter: F,
    slot: CompletionSlot<MatchResult<T>>,
    state: watch::Sender<CorrelatorState>,
    attempts: Arc<AtomicU32>,
}

impl<T, F> WaitTask<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(&T, Option<&str>) -> bool + Send + Sync + 'static,
{
    async fn run(self) {
        self.state.send_replace(CorrelatorState::Subscribing);

        let mut subscription = match self.subscribe_with_retry().await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.state.send_replace(CorrelatorState::Failed);
                self.slot.complete(Err(e));
                // Nothing was created, so nothing to tear down.
                self.state.send_replace(CorrelatorState::Unsubscribed);
                return;
            }
        };

        self.state.send_replace(CorrelatorState::Waiting);
        info!(subject = %self.subject, timeout = ?self.wait_timeout, "waiting for matching message");

        // A panic while waiting still has to reach the caller and the teardown.
        let outcome = AssertUnwindSafe(self.wait_for_match(subscription.as_mut()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let reason = panic_reason(panic.as_ref());
                error!(subject = %self.subject, reason = %reason, "wait aborted by panic");
                Err(CorrelationError::Aborted {
                    subject: self.subject.clone(),
                    reason,
                })
            });
        let terminal = match &outcome {
            Ok(_) => CorrelatorState::Matched,
            Err(CorrelationError::TimedOut { .. }) => CorrelatorState::TimedOut,
            Err(_) => CorrelatorState::Failed,
        };
        self.state.send_replace(terminal);
        self.slot.complete(outcome);

        self.teardown(subscription.as_mut()).await;
        self.state.send_replace(CorrelatorState::Unsubscribed);
    }

    async fn subscribe_with_retry(&self) -> Result<Box<dyn PushSubscription>, CorrelationError> {
        let max_attempts = self.create_retry.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.attempts.store(attempt, Ordering::Release);

            match self.transport.subscribe(&self.subject, &self.options).await {
                Ok(subscription) => {
                    info!(subject = %self.subject, attempt, "subscribed");
                    return Ok(subscription);
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.create_retry.delay_after(attempt);
                    warn!(
                        subject = %self.subject,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "subscription attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        subject = %self.subject,
                        attempts = attempt,
                        error = %e,
                        "subscription retries exhausted"
                    );
                    return Err(CorrelationError::SubscribeExhausted {
                        subject: self.subject.clone(),
                        attempts: attempt,
                        last_error: e,
                    });
                }
            }
        }
    }

    async fn wait_for_match(
        &self,
        subscription: &mut dyn PushSubscription,
    ) -> MatchResult<T> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            let next = tokio::time::timeout_at(deadline, subscription.next_delivery()).await;
            match next {
                Err(_) => {
                    info!(subject = %self.subject, timeout = ?self.wait_timeout, "no matching message before timeout");
                    return Err(CorrelationError::TimedOut {
                        subject: self.subject.clone(),
                        timeout: self.wait_timeout,
                    });
                }
                Ok(None) => {
                    warn!(subject = %self.subject, "subscription ended before a match");
                    return Err(CorrelationError::SubscriptionClosed {
                        subject: self.subject.clone(),
                    });
                }
                Ok(Some(Err(e))) => {
                    warn!(subject = %self.subject, error = %e, "delivery error");
                }
                Ok(Some(Ok(delivery))) => {
                    if let Some(result) = self.handle_delivery(delivery).await {
                        return Ok(result);
                    }
                }
            }
        }
    }

    /// Evaluate one delivery; `Some` only for an acked match
    async fn handle_delivery(&self, delivery: Delivery) -> Option<CorrelationResult<T>> {
        let Some(sequence) = delivery.sequence else {
            warn!(subject = %delivery.subject, "delivery without stream sequence");
            nack_quietly(&delivery).await;
            return None;
        };
        let type_tag = delivery.header(&self.options.type_header).map(str::to_owned);

        let payload: T = match serde_json::from_slice(&delivery.payload) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(subject = %delivery.subject, sequence, error = %e, "payload did not decode");
                nack_quietly(&delivery).await;
                return None;
            }
        };

        let accepted = panic::catch_unwind(AssertUnwindSafe(|| {
            (self.filter)(&payload, type_tag.as_deref())
        }))
        .map_err(|panic| panic_reason(panic.as_ref()));
        match accepted {
            Ok(true) => {}
            Ok(false) => {
                debug!(subject = %delivery.subject, sequence, "filter rejected message");
                return None;
            }
            Err(reason) => {
                warn!(subject = %delivery.subject, sequence, reason = %reason, "filter panicked, skipping message");
                nack_quietly(&delivery).await;
                return None;
            }
        }

        if let Err(e) = delivery.ack().await {
            warn!(subject = %delivery.subject, sequence, error = %e, "ack failed");
            nack_quietly(&delivery).await;
            return None;
        }

        info!(subject = %delivery.subject, sequence, type_tag = ?type_tag, "matched message");
        Some(CorrelationResult {
            payload,
            subject: delivery.subject,
            type_tag: type_tag.unwrap_or_default(),
            sequence,
            timestamp: delivery.timestamp,
        })
    }

    async fn teardown(&self, subscription: &mut dyn PushSubscription) {
        match subscription.unsubscribe().await {
            Ok(()) => debug!(subject = %self.subject, "unsubscribed"),
            Err(TransportError::Closed) => {
                debug!(subject = %self.subject, "connection already closed, treating as unsubscribed");
            }
            Err(e) => warn!(subject = %self.subject, error = %e, "unsubscribe failed"),
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "(non-string panic)".to_string())
}

async fn nack_quietly(delivery: &Delivery) {
    if let Err(e) = delivery.nack().await {
        warn!(subject = %delivery.subject, error = %e, "nack failed");
    }
}
