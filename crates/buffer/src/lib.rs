//! Log-stream side of duet
//!
//! - [`ring`]: bounded per-topic ring buffer with cached snapshots
//! - [`topics`]: the fixed set of buffered topics
//! - [`finder`]: blocking newest-first predicate search and counting
//! - [`poller`]: background thread feeding the buffers from a [`LogSource`]
//! - [`memory`]: channel-backed log source
//! - `kafka` (feature `kafka`): rdkafka-backed log source

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod finder;
pub mod memory;
pub mod poller;
pub mod ring;
pub mod topics;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use finder::{Finder, MIN_POLL_INTERVAL};
pub use memory::{MemoryLogFeed, MemoryLogSource};
pub use poller::{BackgroundPoller, LogSource, PollerError, PollerStats};
pub use ring::{BufferSnapshot, TopicBuffer};
pub use topics::TopicBuffers;

#[cfg(feature = "kafka")]
pub use kafka::KafkaLogSource;
