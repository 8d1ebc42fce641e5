//! Single-writer completion slot
//!
//! Holds the sending half of a oneshot channel. The first caller of
//! [`CompletionSlot::complete`] takes it; every later call is a no-op.

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// A value that can be completed at most once
#[derive(Debug)]
pub struct CompletionSlot<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> CompletionSlot<T> {
    /// Create a slot and the receiver it completes
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Deliver `value`; returns `false` if the slot was already completed
    ///
    /// A dropped receiver still counts as completed.
    pub fn complete(&self, value: T) -> bool {
        let sender = self.sender.lock().take();
        match sender {
            Some(tx) => {
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    /// Whether the slot has been completed
    pub fn is_completed(&self) -> bool {
        self.sender.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_completion_wins() {
        let (slot, rx) = CompletionSlot::new();
        assert!(!slot.is_completed());
        assert!(slot.complete(1));
        assert!(!slot.complete(2));
        assert!(slot.is_completed());
        assert_eq!(rx.await.unwrap(), 1);
    }

    #[test]
    fn test_concurrent_completions() {
        let (slot, mut rx) = CompletionSlot::new();
        let slot = Arc::new(slot);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || slot.complete(i))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_complete_after_receiver_dropped() {
        let (slot, rx) = CompletionSlot::<u8>::new();
        drop(rx);
        assert!(slot.complete(1));
        assert!(!slot.complete(2));
    }
}
