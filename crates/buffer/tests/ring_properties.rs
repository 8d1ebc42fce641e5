//! Property and concurrency tests for topic ring buffers
//!
//! 1. **Bounded retention** - exactly the last C messages survive, in order
//! 2. **Unbounded retention** - capacity 0 keeps everything in order
//! 3. **Count** - structural count equals a naive filter over the snapshot
//! 4. **Concurrent readers** - scans during eviction never see disorder

use duet_buffer::{Finder, TopicBuffer, TopicBuffers};
use duet_core::{RawMessage, SearchCriteria};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn msg(seq: u64, parity: &str) -> RawMessage {
    RawMessage::new(
        "t",
        seq,
        "X",
        format!(r#"{{"seq": {seq}, "parity": "{parity}"}}"#).into_bytes(),
    )
}

fn parity(seq: u64) -> &'static str {
    if seq % 2 == 0 {
        "even"
    } else {
        "odd"
    }
}

proptest! {
    #[test]
    fn bounded_buffer_keeps_last_c(capacity in 1usize..64, pushes in 0u64..256) {
        let buffer = TopicBuffer::new("t", capacity);
        for seq in 0..pushes {
            buffer.push(msg(seq, parity(seq)));
            prop_assert!(buffer.len() <= capacity);
        }

        let kept: Vec<u64> = buffer.snapshot().iter_oldest_first().map(|m| m.sequence).collect();
        let start = pushes.saturating_sub(capacity as u64);
        let expected: Vec<u64> = (start..pushes).collect();
        prop_assert_eq!(kept, expected);
        prop_assert_eq!(buffer.total_evicted(), start);
    }

    #[test]
    fn unbounded_buffer_keeps_all(pushes in 0u64..512) {
        let buffer = TopicBuffer::new("t", 0);
        for seq in 0..pushes {
            buffer.push(msg(seq, parity(seq)));
        }
        let kept: Vec<u64> = buffer.snapshot().iter_oldest_first().map(|m| m.sequence).collect();
        prop_assert_eq!(kept, (0..pushes).collect::<Vec<_>>());
    }

    #[test]
    fn count_equals_structural_matches(capacity in 0usize..32, pushes in 0u64..64) {
        let buffers = Arc::new(TopicBuffers::new([("t", capacity)]));
        for seq in 0..pushes {
            buffers.push("t", msg(seq, parity(seq)));
        }
        let finder = Finder::new(Arc::clone(&buffers));
        let even = SearchCriteria::new().with("parity", "even").unwrap();

        let snapshot = buffers.snapshot("t").unwrap();
        let expected = snapshot
            .iter_oldest_first()
            .filter(|m| m.sequence % 2 == 0)
            .count();
        prop_assert_eq!(finder.count("t", &even), expected);
        prop_assert_eq!(finder.count("t", &SearchCriteria::new()), snapshot.len());
    }
}

#[test]
fn concurrent_readers_see_ordered_snapshots() {
    let buffer = Arc::new(TopicBuffer::new("t", 16));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let buffer = Arc::clone(&buffer);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut scans = 0u64;
                loop {
                    let snapshot = buffer.snapshot();
                    assert!(snapshot.len() <= 16);
                    let seqs: Vec<u64> = snapshot.iter_oldest_first().map(|m| m.sequence).collect();
                    assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));
                    scans += 1;
                    if done.load(Ordering::Acquire) {
                        break scans;
                    }
                }
            })
        })
        .collect();

    for seq in 0..20_000 {
        buffer.push(msg(seq, parity(seq)));
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(buffer.len(), 16);
    assert_eq!(buffer.snapshot().newest().unwrap().sequence, 19_999);
}
