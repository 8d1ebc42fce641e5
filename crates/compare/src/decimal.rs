//! Decimal comparison by value
//!
//! Amounts travel as decimals on both streams but not always with the same
//! scale (`10.0` on one side, `10.00` on the other). Equality is by numeric
//! value; a scale difference alone is reported separately so callers can log
//! it without failing the comparison.

use rust_decimal::Decimal;

/// Outcome of comparing two decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalComparison {
    /// Same value and same scale
    Equal,
    /// Same value, different number of fractional digits
    ScaleDiffers {
        /// Scale on the log side
        log_scale: u32,
        /// Scale on the push side
        push_scale: u32,
    },
    /// Different values
    Differs,
}

impl DecimalComparison {
    /// Whether the values are numerically equal
    pub fn is_equal_value(self) -> bool {
        !matches!(self, DecimalComparison::Differs)
    }
}

/// Compare two decimals by value, noting scale differences
pub fn compare_decimals(log: &Decimal, push: &Decimal) -> DecimalComparison {
    if log != push {
        return DecimalComparison::Differs;
    }
    if log.scale() != push.scale() {
        return DecimalComparison::ScaleDiffers {
            log_scale: log.scale(),
            push_scale: push.scale(),
        };
    }
    DecimalComparison::Equal
}

/// Numeric equality, ignoring scale
pub fn decimals_equal(log: &Decimal, push: &Decimal) -> bool {
    compare_decimals(log, push).is_equal_value()
}
