//! Error types for the push-stream side

use std::time::Duration;
use thiserror::Error;

/// Failures raised by a push transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Could not connect to the broker
    #[error("connection failed: {0}")]
    Connect(String),

    /// Could not create the subscription
    #[error("subscription failed: {0}")]
    Subscribe(String),

    /// Ack or nack was rejected
    #[error("acknowledgement failed: {0}")]
    Ack(String),

    /// The connection or subscription is already closed
    #[error("connection closed")]
    Closed,

    /// The broker sent something unexpected
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Why a single-shot correlation produced no result
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CorrelationError {
    /// Every subscription attempt failed
    #[error("failed to subscribe to '{subject}' after {attempts} attempts: {last_error}")]
    SubscribeExhausted {
        /// Subject that could not be subscribed
        subject: String,
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last_error: TransportError,
    },

    /// No message satisfied the filter in time
    #[error("no matching message on '{subject}' within {timeout:?}")]
    TimedOut {
        /// Subject being watched
        subject: String,
        /// Budget that elapsed
        timeout: Duration,
    },

    /// The broker ended the subscription before a match
    #[error("subscription to '{subject}' closed before a match")]
    SubscriptionClosed {
        /// Subject being watched
        subject: String,
    },

    /// The wait panicked; the subscription was still torn down
    #[error("correlation for '{subject}' aborted: {reason}")]
    Aborted {
        /// Subject being watched
        subject: String,
        /// Panic message
        reason: String,
    },

    /// The wait task ended without reporting
    #[error("correlation for '{subject}' was cancelled")]
    Cancelled {
        /// Subject being watched
        subject: String,
    },
}

impl CorrelationError {
    /// Whether this is the expected "nothing matched" outcome
    pub fn is_timeout(&self) -> bool {
        matches!(self, CorrelationError::TimedOut { .. })
    }
}
