//! Blocking predicate search over topic buffers
//!
//! ## Algorithm
//!
//! ```text
//! loop:
//!   snapshot = buffer(topic).snapshot()
//!   for message in snapshot, newest first:
//!     if criteria match the raw payload:      (cheap structural check)
//!       if payload deserializes into T:       (full decode)
//!         return message
//!   if deadline passed: return None
//!   sleep(poll_interval)
//! ```
//!
//! Not finding anything before the deadline is an expected outcome and is
//! reported as `None`. A payload that matches structurally but fails to
//! deserialize is skipped, not reported.

use crate::topics::TopicBuffers;
use duet_core::{CorrelationResult, RawMessage, SearchCriteria};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lower bound for the poll interval; a zero interval would spin
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Predicate search over a shared set of topic buffers
#[derive(Debug, Clone)]
pub struct Finder {
    buffers: Arc<TopicBuffers>,
}

impl Finder {
    /// Create a finder over the given buffers
    pub fn new(buffers: Arc<TopicBuffers>) -> Self {
        Self { buffers }
    }

    /// The buffers being searched
    pub fn buffers(&self) -> &Arc<TopicBuffers> {
        &self.buffers
    }

    /// Wait for the newest message matching `criteria` that decodes into `T`
    ///
    /// Blocks the calling thread, rescanning every `poll_interval`, for at
    /// most `timeout`. Returns `None` for an unconfigured topic or when
    /// nothing matched in time.
    pub fn find<T: DeserializeOwned>(
        &self,
        topic: &str,
        criteria: &SearchCriteria,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<CorrelationResult<T>> {
        let found = self.poll_until(topic, timeout, poll_interval, |message| {
            decode_if_matching::<T>(message, criteria)
        });
        if found.is_none() {
            debug!(
                topic,
                criteria = %criteria,
                timeout_ms = timeout.as_millis() as u64,
                "no matching message before timeout"
            );
        }
        found
    }

    /// Wait for the newest message satisfying an arbitrary predicate
    pub fn find_raw<P>(
        &self,
        topic: &str,
        predicate: P,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<Arc<RawMessage>>
    where
        P: Fn(&RawMessage) -> bool,
    {
        self.poll_until(topic, timeout, poll_interval, |message| {
            predicate(&**message).then(|| Arc::clone(message))
        })
    }

    /// Count buffered messages matching `criteria`, without blocking
    ///
    /// Scans oldest to newest and never deserializes into a domain type.
    pub fn count(&self, topic: &str, criteria: &SearchCriteria) -> usize {
        let Some(snapshot) = self.buffers.snapshot(topic) else {
            warn!(topic, "count on unconfigured topic");
            return 0;
        };
        if criteria.is_empty() {
            return snapshot.len();
        }
        snapshot
            .iter_oldest_first()
            .filter(|message| criteria.matches_raw(&message.payload))
            .count()
    }

    fn poll_until<R, F>(
        &self,
        topic: &str,
        timeout: Duration,
        poll_interval: Duration,
        mut scan_one: F,
    ) -> Option<R>
    where
        F: FnMut(&Arc<RawMessage>) -> Option<R>,
    {
        if !self.buffers.contains(topic) {
            warn!(topic, "search on unconfigured topic");
            return None;
        }
        let deadline = Instant::now() + timeout;
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);

        loop {
            let snapshot = self.buffers.snapshot(topic)?;
            if let Some(found) = snapshot.iter_newest_first().find_map(&mut scan_one) {
                return Some(found);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep(poll_interval.min(deadline - now));
        }
    }
}

fn decode_if_matching<T: DeserializeOwned>(
    message: &Arc<RawMessage>,
    criteria: &SearchCriteria,
) -> Option<CorrelationResult<T>> {
    if !criteria.is_empty() {
        let value: JsonValue = serde_json::from_slice(&message.payload).ok()?;
        if !criteria.matches(&value) {
            return None;
        }
    }

    // Typed decode reads the bytes again so numbers keep their written form.
    let decoded: serde_json::Result<T> = serde_json::from_slice(&message.payload);

    match decoded {
        Ok(payload) => Some(CorrelationResult {
            payload,
            subject: message.topic.clone(),
            type_tag: message.type_tag.clone(),
            sequence: message.sequence,
            timestamp: message.timestamp,
        }),
        Err(e) => {
            debug!(
                topic = %message.topic,
                sequence = message.sequence,
                target = std::any::type_name::<T>(),
                error = %e,
                "structural match did not deserialize, skipping"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Bet {
        id: u32,
        status: String,
    }

    fn setup(capacity: usize) -> (Arc<TopicBuffers>, Finder) {
        let buffers = Arc::new(TopicBuffers::new([("bets", capacity)]));
        let finder = Finder::new(Arc::clone(&buffers));
        (buffers, finder)
    }

    fn push(buffers: &TopicBuffers, seq: u64, payload: &str) {
        buffers.push("bets", RawMessage::new("bets", seq, "BET", payload.as_bytes().to_vec()));
    }

    const SHORT: Duration = Duration::from_millis(30);
    const POLL: Duration = Duration::from_millis(5);

    #[test]
    fn test_empty_criteria_returns_newest_decodable() {
        let (buffers, finder) = setup(10);
        push(&buffers, 1, r#"{"id": 1, "status": "OPEN"}"#);
        push(&buffers, 2, r#"{"id": 2, "status": "OPEN"}"#);
        push(&buffers, 3, r#"{"unrelated": true}"#);

        let found: CorrelationResult<Bet> = finder
            .find("bets", &SearchCriteria::new(), SHORT, POLL)
            .unwrap();
        assert_eq!(found.payload.id, 2);
        assert_eq!(found.sequence, 2);
        assert_eq!(found.type_tag, "BET");
    }

    #[test]
    fn test_criteria_filter_before_decode() {
        let (buffers, finder) = setup(10);
        push(&buffers, 1, r#"{"id": 1, "status": "SETTLED"}"#);
        push(&buffers, 2, r#"{"id": 2, "status": "OPEN"}"#);

        let criteria = SearchCriteria::new().with("status", "SETTLED").unwrap();
        let found: Bet = finder
            .find("bets", &criteria, SHORT, POLL)
            .unwrap()
            .into_payload();
        assert_eq!(found, Bet { id: 1, status: "SETTLED".into() });
    }

    #[test]
    fn test_impossible_criteria_times_out() {
        let (buffers, finder) = setup(10);
        push(&buffers, 1, r#"{"id": 1, "status": "OPEN"}"#);

        let criteria = SearchCriteria::new().with("status", "VOID").unwrap();
        let start = Instant::now();
        let found: Option<CorrelationResult<Bet>> = finder.find("bets", &criteria, SHORT, POLL);
        let elapsed = start.elapsed();

        assert!(found.is_none());
        assert!(elapsed >= SHORT);
        assert!(elapsed < SHORT + Duration::from_millis(500));
    }

    #[test]
    fn test_unconfigured_topic_is_not_found() {
        let (_buffers, finder) = setup(10);
        let start = Instant::now();
        let found: Option<CorrelationResult<Bet>> =
            finder.find("nope", &SearchCriteria::new(), Duration::from_secs(5), POLL);
        assert!(found.is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(finder.count("nope", &SearchCriteria::new()), 0);
    }

    #[test]
    fn test_count_matches_structurally() {
        let (buffers, finder) = setup(10);
        push(&buffers, 1, r#"{"id": 1, "status": "OPEN"}"#);
        push(&buffers, 2, r#"{"id": 2, "status": "SETTLED"}"#);
        push(&buffers, 3, r#"{"id": "three", "status": "OPEN"}"#);
        push(&buffers, 4, "garbage");

        let open = SearchCriteria::new().with("status", "OPEN").unwrap();
        assert_eq!(finder.count("bets", &open), 2);
        assert_eq!(finder.count("bets", &SearchCriteria::new()), 4);
    }

    #[test]
    fn test_find_sees_message_pushed_while_waiting() {
        let (buffers, finder) = setup(10);
        let producer = Arc::clone(&buffers);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            push(&producer, 7, r#"{"id": 7, "status": "OPEN"}"#);
        });

        let found: Option<CorrelationResult<Bet>> = finder.find(
            "bets",
            &SearchCriteria::new(),
            Duration::from_secs(2),
            POLL,
        );
        handle.join().unwrap();
        assert_eq!(found.unwrap().sequence, 7);
    }

    #[test]
    fn test_find_raw_by_sequence() {
        let (buffers, finder) = setup(10);
        push(&buffers, 1, "{}");
        push(&buffers, 2, "{}");
        let found = finder
            .find_raw("bets", |m| m.sequence == 1, SHORT, POLL)
            .unwrap();
        assert_eq!(found.sequence, 1);
    }
}
