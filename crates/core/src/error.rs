//! Error types for duet
//!
//! This module defines the errors shared by every duet crate.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//! Transport-level failures live next to the transports that raise them.

use crate::path::PathParseError;
use std::io;
use thiserror::Error;

/// Result type alias for duet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared across duet
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (config files, sockets)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be parsed or failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A search or push referenced a topic with no configured buffer
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// A search criterion used a malformed field path
    #[error("Invalid field path: {0}")]
    PathParse(#[from] PathParseError),
}

impl Error {
    /// Build an [`Error::InvalidConfig`] from anything printable
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
