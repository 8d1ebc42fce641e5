//! Payload equivalence for duet
//!
//! Decides whether a log-stream payload and a push-stream payload describe
//! the same event despite different field naming, decimal scale and enum
//! encoding.
//!
//! - [`registry`]: [`Comparator`] / [`Strategy`] and the tag-keyed [`ComparatorRegistry`]
//! - [`check`]: field-by-field checks with mismatch logging
//! - [`decimal`]: value-based decimal comparison
//! - [`codes`]: enums decoded from either an integer code or a name
//! - [`strategies`]: bet, wallet and payment comparators

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod check;
pub mod codes;
pub mod decimal;
pub mod registry;
pub mod strategies;

pub use check::FieldChecks;
pub use codes::{deserialize_coded, Coded};
pub use decimal::{compare_decimals, decimals_equal, DecimalComparison};
pub use registry::{Comparator, ComparatorRegistry, Strategy};
pub use strategies::{BetStrategy, PaymentStrategy, WalletStrategy};

pub use rust_decimal::Decimal;
