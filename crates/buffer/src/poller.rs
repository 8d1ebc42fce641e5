//! Background log-stream poller
//!
//! A single named thread pulls batches from a [`LogSource`] and appends them
//! to the topic buffers. It is the only producer for the buffers; searches
//! read concurrently through snapshots.
//!
//! Source errors are logged and retried after a short backoff. A panicking
//! source is caught so the thread survives to honour shutdown.

use crate::topics::TopicBuffers;
use duet_core::RawMessage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Pause after a failed poll before trying again
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Errors raised by a log source
#[derive(Debug, Error)]
pub enum PollerError {
    /// The source could not connect or subscribe
    #[error("log source connection failed: {0}")]
    Connect(String),

    /// A poll failed
    #[error("log source poll failed: {0}")]
    Poll(String),

    /// The poller thread could not be spawned
    #[error("failed to spawn poller thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The poller is already running
    #[error("poller already running")]
    AlreadyRunning,
}

/// A continuous source of raw log-stream records
pub trait LogSource: Send + 'static {
    /// Start consuming the given topics
    fn subscribe(&mut self, topics: &[String]) -> Result<(), PollerError>;

    /// Return the next batch, waiting at most `timeout`
    ///
    /// An empty batch means nothing arrived in time.
    fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, PollerError>;

    /// Release broker resources
    fn close(&mut self) {}
}

/// Poller metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// Records received from the source
    pub received: u64,
    /// Records appended to a buffer
    pub buffered: u64,
    /// Records dropped for an unconfigured topic
    pub dropped: u64,
    /// Failed polls
    pub errors: u64,
}

#[derive(Default)]
struct PollerInner {
    shutdown: AtomicBool,
    received: AtomicU64,
    buffered: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
}

/// Owns the poller thread
pub struct BackgroundPoller {
    inner: Arc<PollerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundPoller {
    /// Subscribe the source to every buffered topic and start polling
    ///
    /// The thread is named `duet-poller`.
    pub fn spawn(
        mut source: Box<dyn LogSource>,
        buffers: Arc<TopicBuffers>,
        poll_timeout: Duration,
    ) -> Result<Self, PollerError> {
        let topics = buffers.topics();
        source.subscribe(&topics)?;
        info!(?topics, "log-stream poller subscribed");

        let inner = Arc::new(PollerInner::default());
        let inner_clone = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("duet-poller".to_string())
            .spawn(move || poll_loop(source, &buffers, &inner_clone, poll_timeout))?;

        Ok(Self {
            inner,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Whether the thread is still running
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the thread to exit and join it
    ///
    /// Returns within roughly one poll timeout. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("log-stream poller thread panicked");
            }
        }
    }

    /// Snapshot of poller metrics
    pub fn stats(&self) -> PollerStats {
        PollerStats {
            received: self.inner.received.load(Ordering::Relaxed),
            buffered: self.inner.buffered.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            errors: self.inner.errors.load(Ordering::Relaxed),
        }
    }
}

impl Drop for BackgroundPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop(
    mut source: Box<dyn LogSource>,
    buffers: &TopicBuffers,
    inner: &PollerInner,
    poll_timeout: Duration,
) {
    while !inner.shutdown.load(Ordering::Acquire) {
        let polled = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            source.poll(poll_timeout)
        }));

        match polled {
            Ok(Ok(batch)) => {
                for message in batch {
                    inner.received.fetch_add(1, Ordering::Relaxed);
                    let topic = message.topic.clone();
                    if buffers.push(&topic, message) {
                        inner.buffered.fetch_add(1, Ordering::Relaxed);
                    } else {
                        inner.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Ok(Err(e)) => {
                inner.errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "log-stream poll failed, backing off");
                std::thread::sleep(ERROR_BACKOFF);
            }
            Err(panic) => {
                inner.errors.fetch_add(1, Ordering::Relaxed);
                error!(
                    "log source panicked: {:?}",
                    panic
                        .downcast_ref::<&str>()
                        .copied()
                        .unwrap_or("(non-string panic)")
                );
                std::thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    source.close();
    debug!("log-stream poller stopped");
}
