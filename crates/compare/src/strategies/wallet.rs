//! Wallet balance movements
//!
//! Compared as whole objects first. Field details are only logged once the
//! objects are known to differ.

use crate::check::FieldChecks;
use crate::codes::coded_enum;
use crate::registry::Comparator;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tags handled by [`WalletStrategy`]
pub const WALLET_TAGS: &[&str] = &["WALLET_DEBITED", "WALLET_CREDITED"];

coded_enum! {
    /// Why the balance moved
    pub enum WalletReason {
        /// Stake taken for a bet
        BetStake = (0, "BET_STAKE"),
        /// Winnings paid out
        BetPayout = (1, "BET_PAYOUT"),
        /// Stake returned
        BetRefund = (2, "BET_REFUND"),
        /// Funds deposited
        Deposit = (3, "DEPOSIT"),
        /// Funds withdrawn
        Withdrawal = (4, "WITHDRAWAL"),
        /// Manual correction
        Adjustment = (5, "ADJUSTMENT"),
    }
}

/// Wallet event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletEvent {
    /// Wallet id
    #[serde(alias = "wallet_id")]
    pub wallet_id: Uuid,
    /// Owning account
    #[serde(alias = "account_id")]
    pub account_id: Uuid,
    /// Transaction that moved the balance
    #[serde(alias = "transaction_id")]
    pub transaction_id: Uuid,
    /// Amount moved
    pub amount: Decimal,
    /// Balance after the movement
    pub balance: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Reason for the movement
    pub reason: WalletReason,
}

/// Comparator for [`WALLET_TAGS`]
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletStrategy;

impl Comparator for WalletStrategy {
    type Payload = WalletEvent;

    fn name(&self) -> &'static str {
        "wallet"
    }

    fn type_tags(&self) -> &'static [&'static str] {
        WALLET_TAGS
    }

    fn equivalent(
        &self,
        log: &WalletEvent,
        push: &WalletEvent,
        sequence: u64,
        type_tag: &str,
    ) -> bool {
        // Decimal equality is by value, so scale alone never lands here.
        if log == push {
            return true;
        }

        let mut checks = FieldChecks::new(sequence, type_tag);
        checks.eq("walletId", &log.wallet_id, &push.wallet_id);
        checks.eq("accountId", &log.account_id, &push.account_id);
        checks.eq("transactionId", &log.transaction_id, &push.transaction_id);
        checks.decimal("amount", &log.amount, &push.amount);
        checks.decimal("balance", &log.balance, &push.balance);
        checks.eq("currency", &log.currency, &push.currency);
        checks.eq("reason", &log.reason, &push.reason);
        checks.finish();
        false
    }
}
