//! Bet lifecycle events
//!
//! Every field is checked and logged; any mismatch fails the comparison.

use crate::check::FieldChecks;
use crate::codes::coded_enum;
use crate::registry::Comparator;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tags handled by [`BetStrategy`]
pub const BET_TAGS: &[&str] = &["BET_PLACED", "BET_SETTLED", "BET_CANCELLED"];

coded_enum! {
    /// Bet status
    pub enum BetStatus {
        /// Accepted, not yet settled
        Open = (0, "OPEN"),
        /// Settled as a win
        Won = (1, "WON"),
        /// Settled as a loss
        Lost = (2, "LOST"),
        /// Stake returned
        Void = (3, "VOID"),
        /// Cancelled before settlement
        Cancelled = (4, "CANCELLED"),
    }
}

coded_enum! {
    /// Bet structure
    pub enum BetType {
        /// One selection
        Single = (0, "SINGLE"),
        /// Accumulator over all legs
        Multiple = (1, "MULTIPLE"),
        /// Combinations of legs
        System = (2, "SYSTEM"),
    }
}

coded_enum! {
    /// Status of one leg
    pub enum LegStatus {
        /// Not yet resulted
        Open = (0, "OPEN"),
        /// Selection won
        Won = (1, "WON"),
        /// Selection lost
        Lost = (2, "LOST"),
        /// Selection voided
        Void = (3, "VOID"),
    }
}

/// One selection of a bet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetLeg {
    /// Selection backed
    #[serde(alias = "selection_id")]
    pub selection_id: Uuid,
    /// Decimal odds taken
    pub odds: Decimal,
    /// Leg result
    pub status: LegStatus,
}

/// Bet event payload as published on either stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetEvent {
    /// Bet id
    #[serde(alias = "bet_id")]
    pub bet_id: Uuid,
    /// Owning account
    #[serde(alias = "account_id")]
    pub account_id: Uuid,
    /// Amount staked
    pub stake: Decimal,
    /// Potential return, absent for some bet types
    #[serde(default, alias = "potential_payout")]
    pub potential_payout: Option<Decimal>,
    /// Current status
    pub status: BetStatus,
    /// Bet structure
    #[serde(alias = "bet_type")]
    pub bet_type: BetType,
    /// Selections in stored order
    #[serde(default)]
    pub legs: Vec<BetLeg>,
}

/// Comparator for [`BET_TAGS`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BetStrategy;

impl Comparator for BetStrategy {
    type Payload = BetEvent;

    fn name(&self) -> &'static str {
        "bet"
    }

    fn type_tags(&self) -> &'static [&'static str] {
        BET_TAGS
    }

    fn equivalent(&self, log: &BetEvent, push: &BetEvent, sequence: u64, type_tag: &str) -> bool {
        let mut checks = FieldChecks::new(sequence, type_tag);
        checks.eq("betId", &log.bet_id, &push.bet_id);
        checks.eq("accountId", &log.account_id, &push.account_id);
        checks.decimal("stake", &log.stake, &push.stake);
        checks.optional_decimal(
            "potentialPayout",
            log.potential_payout.as_ref(),
            push.potential_payout.as_ref(),
        );
        checks.eq("status", &log.status, &push.status);
        checks.eq("betType", &log.bet_type, &push.bet_type);
        checks.list("legs", &log.legs, &push.legs, |checks, field, l, p| {
            let selection = checks.eq(&format!("{field}.selectionId"), &l.selection_id, &p.selection_id);
            let odds = checks.decimal(&format!("{field}.odds"), &l.odds, &p.odds);
            let status = checks.eq(&format!("{field}.status"), &l.status, &p.status);
            selection && odds && status
        });
        checks.finish()
    }
}
