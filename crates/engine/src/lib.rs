//! Cross-stream correlation engine
//!
//! Ties the push-stream correlator, the log-stream buffers and the
//! comparator registry together:
//!
//! - [`engine`]: the [`Engine`] facade and its builder
//! - [`correlate`]: push result to log record comparison
//! - [`lookup`]: finding the log record for a sequence

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod correlate;
pub mod engine;
pub mod error;
pub mod lookup;

pub use correlate::CrossStreamCorrelator;
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, Result};
pub use lookup::{BufferedLookup, LogRecordLookup};
