//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use duet::compare::strategies::{BetEvent, BetStatus, BetType, WalletEvent, WalletReason};
use duet::core::TopicConfig;
use duet::{DuetConfig, Engine, MemoryLogFeed, MemoryLogSource, MemoryTransport, PushTransport};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ============================================================================
// Initialization
// ============================================================================

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
});

/// Route engine logs to the test output; honours `RUST_LOG`
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

// ============================================================================
// TestEngine - engine wired to in-memory transports
// ============================================================================

pub const BET_TOPIC: &str = "bet-events";
pub const WALLET_TOPIC: &str = "wallet-events";

/// Two buffered topics routed by type tag, short timeouts
pub fn test_config() -> DuetConfig {
    let mut config = DuetConfig::default();
    config.buffer.capacity = 64;
    config.buffer.topics.insert(
        "bets".to_string(),
        TopicConfig {
            name: BET_TOPIC.to_string(),
            capacity: None,
            type_tags: vec!["BET_PLACED".into(), "BET_SETTLED".into(), "BET_CANCELLED".into()],
        },
    );
    config.buffer.topics.insert(
        "wallets".to_string(),
        TopicConfig {
            name: WALLET_TOPIC.to_string(),
            capacity: Some(16),
            type_tags: vec!["WALLET_DEBITED".into(), "WALLET_CREDITED".into()],
        },
    );
    config.search.timeout_ms = 2_000;
    config.search.poll_interval_ms = 10;
    config.kafka.poll_timeout_ms = 20;
    config.subscription.wait_timeout_ms = 2_000;
    config.subscription.create_retry_delay_ms = 5;
    config
}

/// Engine plus handles on both in-memory streams
pub struct TestEngine {
    pub engine: Engine,
    pub push: Arc<MemoryTransport>,
    pub log: MemoryLogFeed,
}

impl TestEngine {
    /// Build and start an engine over `config`
    pub fn start(config: DuetConfig) -> Self {
        init_tracing();
        let push = Arc::new(MemoryTransport::new());
        let (log, source) = MemoryLogSource::channel();
        let engine = Engine::builder()
            .config(config)
            .transport(Arc::clone(&push) as Arc<dyn PushTransport>)
            .log_source(Box::new(source))
            .build()
            .expect("engine builds");
        engine.start().expect("engine starts");
        Self { engine, push, log }
    }
}

// ============================================================================
// Domain fixtures
// ============================================================================

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("valid decimal")
}

pub fn bet(account: Uuid, bet_id: Uuid, stake: &str) -> BetEvent {
    BetEvent {
        bet_id,
        account_id: account,
        stake: dec(stake),
        potential_payout: Some(dec(stake) * dec("2")),
        status: BetStatus::Open,
        bet_type: BetType::Single,
        legs: Vec::new(),
    }
}

pub fn wallet(account: Uuid, transaction: Uuid, amount: &str, balance: &str) -> WalletEvent {
    WalletEvent {
        wallet_id: Uuid::from_u128(0xfeed),
        account_id: account,
        transaction_id: transaction,
        amount: dec(amount),
        balance: dec(balance),
        currency: "EUR".to_string(),
        reason: WalletReason::BetStake,
    }
}
