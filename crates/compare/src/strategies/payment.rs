//! Deposits and withdrawals

use crate::check::FieldChecks;
use crate::codes::coded_enum;
use crate::registry::Comparator;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tags handled by [`PaymentStrategy`]
pub const PAYMENT_TAGS: &[&str] = &["PAYMENT_DEPOSITED", "PAYMENT_WITHDRAWN"];

coded_enum! {
    /// Payment rail
    pub enum PaymentMethod {
        /// Card payment
        Card = (0, "CARD"),
        /// Bank transfer
        BankTransfer = (1, "BANK_TRANSFER"),
        /// E-wallet provider
        EWallet = (2, "E_WALLET"),
        /// Voucher code
        Voucher = (3, "VOUCHER"),
    }
}

/// Payment event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    /// Payment id
    #[serde(alias = "payment_id")]
    pub payment_id: Uuid,
    /// Owning account
    #[serde(alias = "account_id")]
    pub account_id: Uuid,
    /// Amount moved
    pub amount: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Payment rail
    pub method: PaymentMethod,
    /// Provider reference
    #[serde(default)]
    pub reference: Option<String>,
}

/// Comparator for [`PAYMENT_TAGS`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentStrategy;

impl Comparator for PaymentStrategy {
    type Payload = PaymentEvent;

    fn name(&self) -> &'static str {
        "payment"
    }

    fn type_tags(&self) -> &'static [&'static str] {
        PAYMENT_TAGS
    }

    fn equivalent(
        &self,
        log: &PaymentEvent,
        push: &PaymentEvent,
        sequence: u64,
        type_tag: &str,
    ) -> bool {
        let mut checks = FieldChecks::new(sequence, type_tag);
        checks.eq("paymentId", &log.payment_id, &push.payment_id);
        checks.eq("accountId", &log.account_id, &push.account_id);
        checks.decimal("amount", &log.amount, &push.amount);
        checks.eq("currency", &log.currency, &push.currency);
        checks.eq("method", &log.method, &push.method);
        checks.eq("reference", &log.reference, &push.reference);
        checks.finish()
    }
}
