//! Push-stream side of duet
//!
//! - [`correlator`]: single-shot subscribe / wait / unsubscribe with retry and timeout
//! - [`transport`]: the push transport traits
//! - [`memory`]: in-process transport
//! - `nats` (feature `nats`): JetStream transport

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod correlator;
pub mod error;
pub mod memory;
pub mod slot;
pub mod transport;

#[cfg(feature = "nats")]
pub mod nats;

pub use correlator::{
    CorrelatorSettings, CorrelatorState, MatchResult, PendingMatch, SubscriptionCorrelator,
};
pub use error::{CorrelationError, TransportError};
pub use memory::{subject_matches, MemoryTransport, Settlement};
pub use slot::CompletionSlot;
pub use transport::{Acker, Delivery, PushSubscription, PushTransport, SubscribeOptions};

#[cfg(feature = "nats")]
pub use nats::NatsTransport;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
