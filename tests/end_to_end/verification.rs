//! Bet and wallet events verified across both streams

use crate::common::*;
use duet::compare::strategies::{BetEvent, BetStatus, WalletEvent};
use duet::{RawMessage, SearchCriteria};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

/// Publish `push` and `log` as the same event (same sequence, same keys)
fn publish<V: Serialize>(
    t: &TestEngine,
    topic: &str,
    type_tag: &str,
    keys: (Uuid, Uuid),
    push: &V,
    log: &V,
) -> String {
    let subject = format!("events.{}.{}.{}", keys.0, keys.1, type_tag.to_lowercase());
    let sequence = t.push.publish_json(&subject, type_tag, push).unwrap();
    let record = RawMessage::new(topic, sequence, type_tag, serde_json::to_vec(log).unwrap())
        .with_header(
            duet::core::CORRELATION_KEYS_HEADER,
            format!("{}:{}", keys.0, keys.1),
        );
    assert!(t.log.send(record));
    subject
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bet_lifecycle_verified_per_stage() {
    let t = TestEngine::start(test_config());
    let (account, bet_id) = (Uuid::new_v4(), Uuid::new_v4());

    let placed = bet(account, bet_id, "12.5");
    publish(&t, BET_TOPIC, "BET_PLACED", (account, bet_id), &placed, &placed);

    let mut settled_log = bet(account, bet_id, "12.50");
    settled_log.status = BetStatus::Won;
    let mut settled_push = bet(account, bet_id, "12.5");
    settled_push.status = BetStatus::Won;
    publish(
        &t,
        BET_TOPIC,
        "BET_SETTLED",
        (account, bet_id),
        &settled_push,
        &settled_log,
    );

    for (tag, sequence) in [("BET_PLACED", 1), ("BET_SETTLED", 2)] {
        let found = t
            .engine
            .find_push_result::<BetEvent, _>(
                "events.>",
                move |event, event_tag| event.bet_id == bet_id && event_tag == Some(tag),
                WAIT,
            )
            .await
            .unwrap()
            .expect("push event");
        assert_eq!(found.sequence, sequence);
        assert_eq!(found.type_tag, tag);
        assert!(t.engine.are_equivalent(&found), "{tag} should verify");
    }

    let won = SearchCriteria::new()
        .with("betId", bet_id.to_string())
        .unwrap()
        .with("status", "WON")
        .unwrap();
    let log_side: BetEvent = t
        .engine
        .find_log_message("bets", &won, WAIT)
        .expect("settled bet on the log stream");
    assert_eq!(log_side.status, BetStatus::Won);

    t.engine.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wallet_drift_is_reported() {
    let t = TestEngine::start(test_config());
    let (account, transaction) = (Uuid::new_v4(), Uuid::new_v4());

    let push = wallet(account, transaction, "12.50", "87.50");
    let log = wallet(account, transaction, "12.50", "87.00");
    publish(
        &t,
        WALLET_TOPIC,
        "WALLET_DEBITED",
        (account, transaction),
        &push,
        &log,
    );

    let found = t
        .engine
        .find_push_result::<WalletEvent, _>("events.*.*.wallet_debited", |_, _| true, WAIT)
        .await
        .unwrap()
        .expect("push event");
    assert!(!t.engine.are_equivalent(&found));

    t.engine.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn keys_from_another_event_are_rejected() {
    let t = TestEngine::start(test_config());
    let account = Uuid::new_v4();
    let (bet_a, bet_b) = (Uuid::new_v4(), Uuid::new_v4());

    // Same sequence and payload, but the log record claims another bet's keys.
    let event = bet(account, bet_a, "3");
    let subject = format!("events.{account}.{bet_a}.bet_placed");
    let sequence = t.push.publish_json(&subject, "BET_PLACED", &event).unwrap();
    let record = RawMessage::new(
        BET_TOPIC,
        sequence,
        "BET_PLACED",
        serde_json::to_vec(&event).unwrap(),
    )
    .with_key(format!("{account}:{bet_b}"));
    assert!(t.log.send(record));

    let found = t
        .engine
        .find_push_result::<BetEvent, _>(&subject, |_, _| true, WAIT)
        .await
        .unwrap()
        .expect("push event");
    assert!(!t.engine.are_equivalent(&found));

    t.engine.stop().await.unwrap();
}
