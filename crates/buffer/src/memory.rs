//! In-process log source
//!
//! Feeds the background poller from a channel instead of a broker. Used by
//! tests and by embedders that already receive log records some other way.

use crate::poller::{LogSource, PollerError};
use duet_core::RawMessage;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Upper bound on records returned by one poll
const MAX_BATCH: usize = 256;

/// Sending half of a [`MemoryLogSource`]
#[derive(Debug, Clone)]
pub struct MemoryLogFeed {
    tx: Sender<RawMessage>,
}

impl MemoryLogFeed {
    /// Publish a record; returns `false` once the source is gone
    pub fn send(&self, message: RawMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// A [`LogSource`] backed by an in-process channel
#[derive(Debug)]
pub struct MemoryLogSource {
    rx: Receiver<RawMessage>,
    topics: Vec<String>,
}

impl MemoryLogSource {
    /// Create a connected feed/source pair
    pub fn channel() -> (MemoryLogFeed, MemoryLogSource) {
        let (tx, rx) = mpsc::channel();
        (
            MemoryLogFeed { tx },
            MemoryLogSource {
                rx,
                topics: Vec::new(),
            },
        )
    }

    /// Topics the poller subscribed to
    pub fn subscribed_topics(&self) -> &[String] {
        &self.topics
    }
}

impl LogSource for MemoryLogSource {
    fn subscribe(&mut self, topics: &[String]) -> Result<(), PollerError> {
        self.topics = topics.to_vec();
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, PollerError> {
        let first = match self.rx.recv_timeout(timeout) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => {
                // Every feed is gone; nothing more will arrive.
                std::thread::sleep(timeout);
                return Ok(Vec::new());
            }
        };

        let mut batch = vec![first];
        while batch.len() < MAX_BATCH {
            match self.rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(_) => break,
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_batches_pending_records() {
        let (feed, mut source) = MemoryLogSource::channel();
        source.subscribe(&["a".to_string()]).unwrap();
        assert_eq!(source.subscribed_topics(), ["a".to_string()]);

        for seq in 0..3 {
            assert!(feed.send(RawMessage::new("a", seq, "X", b"{}".to_vec())));
        }
        let batch = source.poll(Duration::from_millis(10)).unwrap();
        assert_eq!(batch.len(), 3);
        assert!(source.poll(Duration::from_millis(1)).unwrap().is_empty());
    }

    #[test]
    fn test_poll_after_feed_dropped() {
        let (feed, mut source) = MemoryLogSource::channel();
        drop(feed);
        assert!(source.poll(Duration::from_millis(1)).unwrap().is_empty());
    }
}
