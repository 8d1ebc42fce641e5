//! Bounded per-topic ring buffer
//!
//! A [`TopicBuffer`] keeps the most recent `capacity` messages of one topic
//! in arrival order. Pushing past capacity evicts from the head in O(1).
//!
//! Readers never iterate the live deque. They take a [`BufferSnapshot`], an
//! immutable `Arc` slice that is rebuilt only after the buffer changed, so
//! repeated scans of a quiet topic share one allocation and a push that
//! evicts never disturbs a scan in progress.

use duet_core::RawMessage;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Immutable view of a buffer at one point in time
#[derive(Debug, Clone, Default)]
pub struct BufferSnapshot {
    messages: Arc<[Arc<RawMessage>]>,
}

impl BufferSnapshot {
    /// Number of messages in the snapshot
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Oldest message first
    pub fn iter_oldest_first(&self) -> impl DoubleEndedIterator<Item = &Arc<RawMessage>> {
        self.messages.iter()
    }

    /// Newest message first
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &Arc<RawMessage>> {
        self.messages.iter().rev()
    }

    /// Most recently pushed message
    pub fn newest(&self) -> Option<&Arc<RawMessage>> {
        self.messages.last()
    }

    /// Least recently pushed message still buffered
    pub fn oldest(&self) -> Option<&Arc<RawMessage>> {
        self.messages.first()
    }

    /// Whether two snapshots share the same backing allocation
    pub fn ptr_eq(&self, other: &BufferSnapshot) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }
}

struct Inner {
    messages: VecDeque<Arc<RawMessage>>,
    cached: Option<BufferSnapshot>,
}

/// Bounded FIFO of raw messages for one topic
///
/// Capacity 0 means unbounded. Invariants:
/// - `len() <= capacity` after every push when `capacity > 0`
/// - iteration order is arrival order
pub struct TopicBuffer {
    topic: String,
    capacity: usize,
    inner: RwLock<Inner>,
    pushed: AtomicU64,
    evicted: AtomicU64,
}

impl TopicBuffer {
    /// Create an empty buffer
    pub fn new(topic: impl Into<String>, capacity: usize) -> Self {
        let initial = if capacity == 0 { 0 } else { capacity.min(1024) };
        Self {
            topic: topic.into(),
            capacity,
            inner: RwLock::new(Inner {
                messages: VecDeque::with_capacity(initial),
                cached: None,
            }),
            pushed: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Topic this buffer holds
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Configured capacity (0 = unbounded)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a message, evicting the oldest ones past capacity
    ///
    /// Returns the number of messages evicted by this push.
    pub fn push(&self, message: RawMessage) -> usize {
        let message = Arc::new(message);
        let mut evicted = 0;
        {
            let mut inner = self.inner.write();
            inner.messages.push_back(message);
            if self.capacity > 0 {
                while inner.messages.len() > self.capacity {
                    if let Some(old) = inner.messages.pop_front() {
                        trace!(
                            topic = %self.topic,
                            sequence = old.sequence,
                            "evicted oldest buffered message"
                        );
                        evicted += 1;
                    }
                }
            }
            inner.cached = None;
        }
        self.pushed.fetch_add(1, Ordering::Relaxed);
        if evicted > 0 {
            self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        evicted
    }

    /// Current contents as an immutable snapshot
    pub fn snapshot(&self) -> BufferSnapshot {
        let inner = self.inner.upgradable_read();
        if let Some(cached) = &inner.cached {
            return cached.clone();
        }
        let mut inner = RwLockUpgradableReadGuard::upgrade(inner);
        let snapshot = BufferSnapshot {
            messages: inner.messages.iter().cloned().collect(),
        };
        inner.cached = Some(snapshot.clone());
        snapshot
    }

    /// Remove every message
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.messages.clear();
        inner.cached = None;
    }

    /// Number of buffered messages
    pub fn len(&self) -> usize {
        self.inner.read().messages.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().messages.is_empty()
    }

    /// Messages pushed since creation
    pub fn total_pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Messages evicted since creation
    pub fn total_evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for TopicBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicBuffer")
            .field("topic", &self.topic)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
