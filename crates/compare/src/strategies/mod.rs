//! Domain comparator strategies

pub mod bet;
pub mod payment;
pub mod wallet;

pub use bet::{BetEvent, BetLeg, BetStatus, BetStrategy, BetType, LegStatus, BET_TAGS};
pub use payment::{PaymentEvent, PaymentMethod, PaymentStrategy, PAYMENT_TAGS};
pub use wallet::{WalletEvent, WalletReason, WalletStrategy, WALLET_TAGS};
