//! duet - cross-broker event correlation and verification
//!
//! Given a push stream with acknowledgements (NATS JetStream) and a
//! partitioned log stream (Kafka), duet finds one matching event on each side
//! within a time budget and decides whether the two describe the same fact.
//!
//! # Quick Start
//!
//! ```ignore
//! use duet::{DuetConfig, Engine, MemoryTransport};
//!
//! let engine = Engine::builder()
//!     .config(DuetConfig::from_file(Path::new("duet.toml"))?)
//!     .transport(Arc::new(MemoryTransport::new()))
//!     .build()?;
//! engine.start()?;
//!
//! let placed = engine
//!     .find_push_result::<BetEvent, _>("bets.>", |bet, _| bet.bet_id == id, timeout)
//!     .await?;
//! ```
//!
//! # Architecture
//!
//! - `duet-core`: configuration, criteria, envelopes, errors
//! - `duet-buffer`: topic ring buffers, predicate search, background poller
//! - `duet-subscriber`: single-shot push subscription correlator
//! - `duet-compare`: comparator registry and domain strategies
//! - `duet-engine`: cross-stream correlation and the [`Engine`] facade

pub use duet_buffer as buffer;
pub use duet_compare as compare;
pub use duet_core as core;
pub use duet_engine as engine;
pub use duet_subscriber as subscriber;

pub use duet_buffer::{Finder, LogSource, MemoryLogFeed, MemoryLogSource, TopicBuffers};
pub use duet_compare::{Comparator, ComparatorRegistry, Strategy};
pub use duet_core::{
    CorrelationKeys, CorrelationResult, DuetConfig, Error, LogRecord, RawMessage, RetryPolicy,
    SearchCriteria,
};
pub use duet_engine::{
    BufferedLookup, CrossStreamCorrelator, Engine, EngineBuilder, EngineError, LogRecordLookup,
};
pub use duet_subscriber::{
    CorrelationError, MemoryTransport, PendingMatch, PushTransport, SubscriptionCorrelator,
    TransportError,
};

#[cfg(feature = "kafka")]
pub use duet_buffer::KafkaLogSource;
#[cfg(feature = "nats")]
pub use duet_subscriber::NatsTransport;
