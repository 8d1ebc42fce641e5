//! End-to-end Tests
//!
//! Full verification runs through the `duet` facade, both streams in memory:
//! - Bet placed and settled on both streams, verified per stage
//! - Wallet movement with one drifting field
//! - Ring buffer eviction under a small per-topic capacity
//! - Configuration loaded from a file

#[path = "../common/mod.rs"]
mod common;

mod config_file;
mod eviction;
mod verification;
