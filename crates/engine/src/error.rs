//! Engine errors

use duet_buffer::PollerError;
use duet_subscriber::TransportError;
use thiserror::Error;

/// Errors raised while building or running an [`Engine`](crate::Engine)
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] duet_core::Error),

    /// The log-stream poller could not start
    #[error(transparent)]
    Poller(#[from] PollerError),

    /// The push transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A required collaborator was not supplied to the builder
    #[error("engine builder is missing a {0}")]
    Missing(&'static str),

    /// `start` was called on a running engine
    #[error("engine already started")]
    AlreadyStarted,

    /// `start` was called after `stop`; the transport and log source are gone
    #[error("engine was stopped and cannot be restarted")]
    Stopped,
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
