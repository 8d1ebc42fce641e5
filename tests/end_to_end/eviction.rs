//! Ring buffer retention seen through the engine

use crate::common::*;
use duet::{RawMessage, SearchCriteria};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn small_topic_keeps_only_the_newest_records() {
    let t = TestEngine::start(test_config());

    for sequence in 1..=40u64 {
        let payload = format!(r#"{{"sequence": {sequence}}}"#).into_bytes();
        assert!(t.log.send(RawMessage::new(
            WALLET_TOPIC,
            sequence,
            "WALLET_CREDITED",
            payload
        )));
    }

    let last = SearchCriteria::new().with("sequence", "40").unwrap();
    assert!(t
        .engine
        .find_log_message::<serde_json::Value>("wallets", &last, Duration::from_secs(2))
        .is_some());

    // Capacity 16: sequences 25..=40 remain.
    assert_eq!(
        t.engine
            .count_log_messages("wallets", &SearchCriteria::new()),
        16
    );
    let evicted = SearchCriteria::new().with("sequence", "24").unwrap();
    assert_eq!(t.engine.count_log_messages("wallets", &evicted), 0);
    let kept = SearchCriteria::new().with("sequence", "25").unwrap();
    assert_eq!(t.engine.count_log_messages("wallets", &kept), 1);

    let snapshot = t.engine.buffers().snapshot(WALLET_TOPIC).unwrap();
    assert_eq!(snapshot.oldest().unwrap().sequence, 25);
    assert_eq!(snapshot.newest().unwrap().sequence, 40);

    t.engine.stop().await.unwrap();
}
