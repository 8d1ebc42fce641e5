//! Core types for duet
//!
//! This crate defines the foundational types shared by every duet crate:
//! - RawMessage: undecoded envelope from either stream
//! - CorrelationResult: decoded payload plus sequence, type tag and origin
//! - CorrelationKeys / LogRecord: cross-stream correlation inputs
//! - FieldPath / SearchCriteria: structural filtering of raw payloads
//! - DuetConfig: `duet.toml` configuration
//! - RetryPolicy: bounded retry with fixed or exponential delay
//! - Error: shared error type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod criteria;
pub mod error;
pub mod path;
pub mod retry;
pub mod types;

pub use config::{
    BufferConfig, DuetConfig, KafkaConfig, NatsConfig, SearchConfig, SubscriptionConfig,
    TopicConfig, CONFIG_FILE_NAME, DEFAULT_BUFFER_CAPACITY,
};
pub use criteria::{Criterion, SearchCriteria};
pub use error::{Error, Result};
pub use path::{FieldPath, PathParseError, PathSegment};
pub use retry::RetryPolicy;
pub use types::{
    CorrelationKeys, CorrelationResult, LogRecord, RawMessage, CORRELATION_KEYS_HEADER,
    SEQUENCE_HEADER, TYPE_HEADER,
};
